//! goose scenarios built around the order-flow flows.
use std::sync::Arc;

use goose::prelude::*;
use log::error;
use order_flow::{
    config::{self, Settings},
    flow::{browse, verify_order, FlowContext},
    metrics::Metrics,
    model::Store,
    transport::Session,
};
use rand::{rngs::StdRng, SeedableRng};

use crate::goose_transport::GooseTransport;

/// Everything shared by the users of a run: read only, except the metrics
pub struct RunContext {
    /// configuration of the run
    pub settings: Settings,
    /// customer session obtained at setup
    pub session: Session,
    /// approved stores loaded at setup
    pub stores: Vec<Store>,
    /// custom series, judged by the thresholds at the end
    pub metrics: Metrics,
    /// note attached to every order
    pub note: String,
}

impl RunContext {
    /// new context, the order note names the profile
    pub fn new(settings: Settings, session: Session, stores: Vec<Store>, metrics: Metrics) -> Self {
        let note = format!("goose {} test order", settings.profile);
        RunContext {
            settings,
            session,
            stores,
            metrics,
            note,
        }
    }

    fn flow_context(&self) -> FlowContext<'_> {
        FlowContext {
            endpoints: &self.settings.endpoints,
            metrics: &self.metrics,
            think_time: self.settings.think_time,
            store_page_size: self.settings.store_page_size,
            note: &self.note,
        }
    }
}

/// one iteration: choose, order, verify the price
async fn order_create_flow(user: &mut GooseUser, run: &RunContext) -> TransactionResult {
    let mut rng = StdRng::from_entropy();
    let mut api = GooseTransport::new(user, &run.session);
    // a failed flow only ends this iteration
    if let Err(e) = verify_order(&mut api, &run.flow_context(), &run.stores, &mut rng).await {
        error!("Order Create Flow aborted: {e}");
    }
    Ok(())
}

/// one iteration of a browsing customer
async fn customer_flow(user: &mut GooseUser, run: &RunContext) -> TransactionResult {
    let mut rng = StdRng::from_entropy();
    let mut api = GooseTransport::new(user, &run.session);
    if let Err(e) = browse(&mut api, &run.flow_context(), &run.stores, &mut rng).await {
        error!("Customer Flow aborted: {e}");
    }
    Ok(())
}

/// the goose scenario matching the configured behaviour
pub fn build(run: Arc<RunContext>) -> Scenario {
    let (name, transaction_name) = match run.settings.scenario {
        config::Scenario::Order => ("OrderTest", "Order Create Flow"),
        config::Scenario::Browse => ("CustomerBrowse", "Customer Flow"),
    };
    let scenario = run.settings.scenario;

    let closure: TransactionFunction = Arc::new(move |user| {
        let run = run.clone();
        Box::pin(async move {
            match scenario {
                config::Scenario::Order => order_create_flow(user, &run).await,
                config::Scenario::Browse => customer_flow(user, &run).await,
            }
        })
    });

    // the flows pause on their own, no goose wait time on top
    Scenario::new(name).register_transaction(Transaction::new(closure).set_name(transaction_name))
}
