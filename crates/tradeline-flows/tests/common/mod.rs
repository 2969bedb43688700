//! Shared harness: an issuer, a buyer and a seller on one in-process network.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing_subscriber::EnvFilter;
use tradeline_flows::{
    Directory, FinalityService, InMemoryNotary, Inbox, Network, Orchestrator, ParticipantContext,
    SettlementOutcome, SettlementPlan,
};
use tradeline_types::{
    Identity, NotaryConfig, OrderRecord, OrderStatus, ParticipantConfig, PartyId, RecordKind,
    Result, constants,
};
use tradeline_vault::{HoldingsQuery, SharedVault};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Poll `condition` until it holds; panics after two seconds.
pub async fn eventually(what: &str, condition: impl Fn() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {what}");
}

pub struct Participant {
    pub orchestrator: Orchestrator,
    seed: [u8; 32],
    server: Option<JoinHandle<()>>,
    parked: Option<Inbox>,
}

impl Participant {
    pub fn id(&self) -> PartyId {
        self.orchestrator.context().id()
    }

    pub fn identity(&self) -> &Identity {
        &self.orchestrator.context().identity
    }

    pub fn vault(&self) -> &SharedVault {
        &self.orchestrator.context().vault
    }

    pub fn total(&self) -> i64 {
        self.vault().total_balance(&self.id())
    }

    pub fn orders(&self, status: OrderStatus) -> Vec<OrderRecord> {
        self.vault()
            .find_live(RecordKind::Order, &|r| {
                r.as_order().is_some_and(|o| o.status == status)
            })
            .into_iter()
            .filter_map(|live| live.record.as_order().cloned())
            .collect()
    }

    pub async fn settle(&self, plan: SettlementPlan) -> Result<SettlementOutcome> {
        self.orchestrator.settle(plan).await
    }

    /// Answer sessions arriving for this party.
    fn serve(mut self, network: &Network) -> Self {
        let inbox = network.register(self.id());
        self.server = Some(self.orchestrator.serve(inbox));
        self
    }

    /// Stop answering. New sessions still reach the party but queue up
    /// unanswered.
    pub fn silence(&mut self, network: &Network) {
        if let Some(server) = self.server.take() {
            server.abort();
        }
        self.parked = Some(network.register(self.id()));
    }
}

pub struct Harness {
    pub notary: Arc<InMemoryNotary>,
    pub network: Network,
    pub directory: Arc<Directory>,
    pub issuer: Participant,
    pub buyer: Participant,
    pub seller: Participant,
    session_timeout_ms: u64,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_session_timeout(constants::DEFAULT_SESSION_TIMEOUT_MS)
    }

    pub fn with_session_timeout(session_timeout_ms: u64) -> Self {
        init_tracing();
        let notary = Arc::new(InMemoryNotary::new(
            Identity::generate("Notary"),
            NotaryConfig::default(),
        ));
        let network = Network::new();
        let [issuer, buyer, seller] =
            ["Issuer", "Buyer", "Seller"].map(|name| (name, rand::random::<[u8; 32]>()));
        let directory: Arc<Directory> = Arc::new(
            [issuer, buyer, seller]
                .iter()
                .map(|(name, seed)| Identity::from_seed(*name, *seed).party())
                .collect(),
        );

        let join = |(name, seed): (&str, [u8; 32])| {
            let participant =
                Self::build(&notary, &network, &directory, name, seed, session_timeout_ms);
            participant.serve(&network)
        };
        let issuer = join(issuer);
        let buyer = join(buyer);
        let seller = join(seller);

        Self {
            notary,
            network,
            directory,
            issuer,
            buyer,
            seller,
            session_timeout_ms,
        }
    }

    /// A participant that is not yet reachable on the network.
    fn build(
        notary: &Arc<InMemoryNotary>,
        network: &Network,
        directory: &Arc<Directory>,
        name: &str,
        seed: [u8; 32],
        session_timeout_ms: u64,
    ) -> Participant {
        let identity = Identity::from_seed(name, seed);
        let mut config = ParticipantConfig::new(identity.name(), notary.id());
        config.session_timeout_ms = session_timeout_ms;
        let finality: Arc<dyn FinalityService> = notary.clone();
        let ctx = ParticipantContext::new(
            identity,
            Arc::clone(directory),
            network.clone(),
            finality,
            config,
        )
        .unwrap();
        Participant {
            orchestrator: Orchestrator::new(ctx),
            seed,
            server: None,
            parked: None,
        }
    }

    /// Another served participant on the same network.
    pub fn participant(&self, name: &str) -> Participant {
        Self::build(
            &self.notary,
            &self.network,
            &self.directory,
            name,
            rand::random(),
            self.session_timeout_ms,
        )
        .serve(&self.network)
    }

    /// A second device of `of`: same identity, its own empty vault, and not
    /// reachable on the network. Sessions it opens reach peers as `of`.
    pub fn twin(&self, of: &Participant) -> Participant {
        Self::build(
            &self.notary,
            &self.network,
            &self.directory,
            of.identity().name(),
            of.seed,
            self.session_timeout_ms,
        )
    }

    /// Issue `amount` to `owner` and wait until its vault shows it.
    pub async fn fund(&self, owner: &Participant, amount: i64) -> SettlementOutcome {
        let before = owner.total();
        let outcome = self
            .issuer
            .settle(SettlementPlan::Issue {
                owner: owner.id(),
                amount,
            })
            .await
            .unwrap();
        eventually("issued balance to arrive", || owner.total() == before + amount).await;
        outcome
    }
}
