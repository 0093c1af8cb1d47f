use std::sync::Arc;

use dashmap::DashMap;
use uuid::Uuid;

use crate::config::Config;
use crate::models::assignment::DeliveryAssignment;
use crate::models::order::Order;
use crate::models::rating::Rating;
use crate::models::shop::{Item, Shop};
use crate::models::user::User;
use crate::notify::Notifier;
use crate::observability::metrics::Metrics;
use crate::services::{
    Geocoder, ImageStore, InMemoryGeocoder, InMemoryImageStore, InMemoryMailSender,
    InMemoryPaymentGateway, MailSender, PaymentGateway,
};

/// Key for the ratings collection: (customer, item, order). The map key is
/// the unique constraint.
pub type RatingKey = (Uuid, Uuid, Uuid);

pub struct AppState {
    pub config: Config,
    pub users: DashMap<Uuid, User>,
    pub shops: DashMap<Uuid, Shop>,
    pub items: DashMap<Uuid, Item>,
    pub orders: DashMap<Uuid, Order>,
    pub assignments: DashMap<Uuid, DeliveryAssignment>,
    pub ratings: DashMap<RatingKey, Rating>,
    pub notifier: Notifier,
    pub metrics: Metrics,
    pub payments: Arc<dyn PaymentGateway>,
    pub geocoder: Arc<dyn Geocoder>,
    pub mailer: Arc<dyn MailSender>,
    pub images: Arc<dyn ImageStore>,
}

impl AppState {
    /// State wired to the in-memory collaborators, used by `main` for local
    /// runs and by the test suites.
    pub fn new(config: Config) -> Self {
        Self::with_collaborators(
            config,
            Arc::new(InMemoryPaymentGateway::new()),
            Arc::new(InMemoryGeocoder),
            Arc::new(InMemoryMailSender::new()),
            Arc::new(InMemoryImageStore),
        )
    }

    pub fn with_collaborators(
        config: Config,
        payments: Arc<dyn PaymentGateway>,
        geocoder: Arc<dyn Geocoder>,
        mailer: Arc<dyn MailSender>,
        images: Arc<dyn ImageStore>,
    ) -> Self {
        Self {
            config,
            users: DashMap::new(),
            shops: DashMap::new(),
            items: DashMap::new(),
            orders: DashMap::new(),
            assignments: DashMap::new(),
            ratings: DashMap::new(),
            notifier: Notifier::new(),
            metrics: Metrics::new(),
            payments,
            geocoder,
            mailer,
            images,
        }
    }
}
