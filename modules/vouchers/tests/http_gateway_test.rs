//! Remote gateway against the real server stack on an ephemeral port.

use std::collections::HashMap;
use std::sync::Arc;

use axum::Router;
use modkit::{ConfigProvider, ModuleCtxBuilder, ModuleRegistry, TracedClient};
use modkit_db::{ConnectOpts, DbHandle};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use api_ingress::ApiIngress;
use vouchers::{
    DiscountType, NewVoucher, VoucherPatch, VouchersApi, VouchersError, VouchersHttpClient,
};

struct MapConfig(HashMap<String, serde_json::Value>);

impl ConfigProvider for MapConfig {
    fn get_module_config(&self, module_name: &str) -> Option<&serde_json::Value> {
        self.0.get(module_name)
    }
}

struct Server {
    registry: ModuleRegistry,
    cancel: CancellationToken,
    base: String,
}

impl Server {
    async fn start() -> Self {
        let mut cfg = HashMap::new();
        cfg.insert(
            "api_ingress".to_string(),
            serde_json::json!({ "bind_addr": "127.0.0.1:0" }),
        );
        let db = Arc::new(
            DbHandle::connect("sqlite::memory:", ConnectOpts::default())
                .await
                .unwrap(),
        );
        let cancel = CancellationToken::new();
        let ctx = ModuleCtxBuilder::new(cancel.clone())
            .with_config_provider(Arc::new(MapConfig(cfg)))
            .with_db(db.clone())
            .build();

        let registry =
            ModuleRegistry::from_registrators(&[api_ingress::register, vouchers::register])
                .unwrap();
        registry.run_init_phase(&ctx).await.unwrap();
        registry.run_db_phase(&db).await.unwrap();
        registry.run_rest_phase(&ctx, Router::new()).unwrap();
        registry.run_start_phase(cancel.clone()).await.unwrap();

        let addr = registry
            .modules()
            .iter()
            .find(|m| m.name == api_ingress::MODULE_NAME)
            .and_then(|m| m.core.as_any().downcast_ref::<ApiIngress>())
            .and_then(ApiIngress::bound_addr)
            .expect("server bound");
        Self {
            registry,
            cancel,
            base: format!("http://{addr}"),
        }
    }

    fn client(&self) -> VouchersHttpClient {
        VouchersHttpClient::new(&self.base, TracedClient::default()).unwrap()
    }

    async fn stop(self) {
        self.cancel.cancel();
        self.registry.run_stop_phase(self.cancel).await;
    }
}

fn new_voucher(code: &str) -> NewVoucher {
    NewVoucher {
        code: code.into(),
        discount_amount: 25.0,
        discount_type: DiscountType::Percentage,
        expiry_date: None,
        is_active: true,
    }
}

#[tokio::test]
async fn crud_round_trip_over_http() {
    let server = Server::start().await;
    let client = server.client();

    let created = client.create_voucher(new_voucher("discount10")).await.unwrap();
    assert_eq!(created.code, "DISCOUNT10");

    let fetched = client.get_voucher(created.id).await.unwrap();
    assert_eq!(fetched.id, created.id);
    assert_eq!(fetched.code, "DISCOUNT10");
    assert_eq!(fetched.discount_type, DiscountType::Percentage);

    let updated = client
        .update_voucher(
            created.id,
            VoucherPatch {
                is_active: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(!updated.is_active);

    assert_eq!(client.list_vouchers().await.unwrap().len(), 1);
    client.delete_voucher(created.id).await.unwrap();
    assert!(client.list_vouchers().await.unwrap().is_empty());

    server.stop().await;
}

#[tokio::test]
async fn status_codes_map_onto_the_error_taxonomy() {
    let server = Server::start().await;
    let client = server.client();

    client.create_voucher(new_voucher("TAKEN")).await.unwrap();
    assert_eq!(
        client.create_voucher(new_voucher(" taken ")).await.unwrap_err(),
        VouchersError::code_conflict("TAKEN")
    );

    let other = client.create_voucher(new_voucher("OTHER")).await.unwrap();
    let patch = VoucherPatch {
        code: Some("taken".into()),
        ..Default::default()
    };
    assert_eq!(
        client.update_voucher(other.id, patch).await.unwrap_err(),
        VouchersError::code_conflict("TAKEN")
    );
    assert_eq!(client.get_voucher(other.id).await.unwrap().code, "OTHER");

    let ghost = Uuid::new_v4();
    assert_eq!(
        client.delete_voucher(ghost).await.unwrap_err(),
        VouchersError::not_found(ghost)
    );

    let mut bad = new_voucher("BAD");
    bad.discount_amount = 250.0;
    assert!(matches!(
        client.create_voucher(bad).await,
        Err(VouchersError::Validation { message }) if message.contains("100%")
    ));

    let report = client
        .bulk_delete_vouchers(vec![ghost])
        .await
        .unwrap();
    assert!(report.succeeded.is_empty());
    assert_eq!(report.failed[0].id, ghost);

    server.stop().await;
}

#[tokio::test]
async fn unreachable_server_is_a_transport_error() {
    let server = Server::start().await;
    let client = server.client();
    server.stop().await;

    assert!(matches!(
        client.list_vouchers().await,
        Err(VouchersError::Transport { .. })
    ));
}
