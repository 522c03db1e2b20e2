use std::sync::Arc;

use anyhow::Context;
use axum::{routing::get, Router};
use tracing::{info, warn};

use appointment_cell::{
    appointment_routes, BookingStore, MemoryBookingStore, SchedulingService, SupabaseBookingStore,
};
use order_cell::{order_routes, MemoryOrderStore, OrderService, OrderStore, SupabaseOrderStore};
use provider_cell::{
    provider_routes, InMemoryProviderDirectory, ProviderDirectory, ProviderSearchService,
    SupabaseProviderDirectory,
};
use shared_config::{AppConfig, StorageBackend};
use shared_database::SupabaseClient;

pub struct AppServices {
    pub providers: Arc<ProviderSearchService>,
    pub scheduling: Arc<SchedulingService>,
    pub orders: Arc<OrderService>,
}

impl AppServices {
    /// Wires directory, stores and services for the configured backend.
    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let (directory, bookings, orders): (
            Arc<dyn ProviderDirectory>,
            Arc<dyn BookingStore>,
            Arc<dyn OrderStore>,
        ) = match config.storage_backend {
            StorageBackend::Supabase => {
                if !config.is_supabase_configured() {
                    anyhow::bail!("STORAGE_BACKEND=supabase requires SUPABASE_URL and SUPABASE_ANON_PUBLIC_KEY");
                }
                info!("Using Supabase storage at {}", config.supabase_url);
                let client = Arc::new(SupabaseClient::new(config));
                let directory: Arc<dyn ProviderDirectory> =
                    Arc::new(SupabaseProviderDirectory::new(client.clone()));
                let bookings: Arc<dyn BookingStore> =
                    Arc::new(SupabaseBookingStore::new(client.clone()));
                let orders: Arc<dyn OrderStore> = Arc::new(SupabaseOrderStore::new(client));
                (directory, bookings, orders)
            }
            StorageBackend::Memory => {
                let directory = match config.provider_directory_path.as_deref() {
                    Some(path) => InMemoryProviderDirectory::from_json_file(path)
                        .context("loading provider directory")?,
                    None => {
                        warn!("PROVIDER_DIRECTORY_PATH not set, starting with an empty directory");
                        InMemoryProviderDirectory::new(Vec::new())
                    }
                };
                info!("Using in-memory storage with {} providers", directory.len());
                let directory: Arc<dyn ProviderDirectory> = Arc::new(directory);
                let bookings: Arc<dyn BookingStore> = Arc::new(MemoryBookingStore::new());
                let orders: Arc<dyn OrderStore> = Arc::new(MemoryOrderStore::new());
                (directory, bookings, orders)
            }
        };

        let providers = Arc::new(ProviderSearchService::new(directory));
        let scheduling = Arc::new(SchedulingService::new(
            &config.scheduling,
            providers.clone(),
            bookings,
        ));

        Ok(Self {
            providers,
            scheduling,
            orders: Arc::new(OrderService::new(orders)),
        })
    }
}

pub fn create_router(config: Arc<AppConfig>, services: AppServices) -> Router {
    Router::new()
        .route("/", get(|| async { "Clinic scheduling API is running!" }))
        .nest("/providers", provider_routes(config.clone(), services.providers))
        .nest("/appointments", appointment_routes(config.clone(), services.scheduling))
        .nest("/orders", order_routes(config, services.orders))
}
