use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use seamline_engine::{CatalogApi, OrderFlowApi, PaymentApi, SqliteDatabase, UserApi};

use crate::{
    auth::TokenIssuer,
    config::{ServerConfig, ServerOptions},
    errors::ServerError,
    middleware::{HmacMiddlewareFactory, JwtMiddlewareFactory},
    routes::{
        health,
        AddTrackingRoute,
        ApproveOrderRoute,
        ApprovedOrdersRoute,
        AuthRoute,
        BulkShowOnHomeRoute,
        CancelOrderRoute,
        CreateProductRoute,
        DeleteProductRoute,
        DeleteUserRoute,
        MyOrdersRoute,
        MyProductsRoute,
        OrderRoute,
        OrderTrackingRoute,
        PaymentForOrderRoute,
        PaymentWebhookRoute,
        PendingOrdersRoute,
        PlaceOrderRoute,
        ProductCategoriesRoute,
        ProductRoute,
        ProductStatsRoute,
        ProductsRoute,
        ProfileRoute,
        RecordPaymentRoute,
        RegisterRoute,
        RejectOrderRoute,
        SearchOrdersRoute,
        SetShowOnHomeRoute,
        SuspendUserRoute,
        SuspensionsRoute,
        UpdateProductRoute,
        UpdateProfileRoute,
        UpdateRoleRoute,
        UserRoleRoute,
        UsersRoute,
    },
};

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let srv = create_server_instance(config, db)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance(config: ServerConfig, db: SqliteDatabase) -> Result<Server, ServerError> {
    let auth_config = config.auth.clone();
    let options = ServerOptions::from_config(&config);
    let webhook_enabled = config.payment_webhook_secret.is_some();
    let webhook_key = config.payment_webhook_secret.clone().unwrap_or_default();
    let srv = HttpServer::new(move || {
        let orders_api = OrderFlowApi::new(db.clone());
        let catalog_api = CatalogApi::new(db.clone());
        let users_api = UserApi::new(db.clone());
        let payments_api = PaymentApi::new(db.clone());
        let jwt_signer = TokenIssuer::new(&auth_config);
        let app = App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("slm::access_log"))
            .app_data(web::Data::new(orders_api))
            .app_data(web::Data::new(catalog_api))
            .app_data(web::Data::new(users_api))
            .app_data(web::Data::new(payments_api))
            .app_data(web::Data::new(jwt_signer))
            .app_data(web::Data::new(options))
            .app_data(web::Data::new(auth_config.clone()));
        // Routes that require authentication. Specific paths are registered before their
        // parameterised siblings, so /orders/my resolves before /orders/{id}.
        let auth_scope = web::scope("/api")
            .wrap(JwtMiddlewareFactory::new(&auth_config))
            .service(MyProductsRoute::<SqliteDatabase>::new())
            .service(BulkShowOnHomeRoute::<SqliteDatabase>::new())
            .service(CreateProductRoute::<SqliteDatabase>::new())
            .service(SetShowOnHomeRoute::<SqliteDatabase>::new())
            .service(UpdateProductRoute::<SqliteDatabase>::new())
            .service(DeleteProductRoute::<SqliteDatabase>::new())
            .service(MyOrdersRoute::<SqliteDatabase>::new())
            .service(PendingOrdersRoute::<SqliteDatabase>::new())
            .service(ApprovedOrdersRoute::<SqliteDatabase>::new())
            .service(PlaceOrderRoute::<SqliteDatabase>::new())
            .service(SearchOrdersRoute::<SqliteDatabase>::new())
            .service(ApproveOrderRoute::<SqliteDatabase>::new())
            .service(RejectOrderRoute::<SqliteDatabase>::new())
            .service(CancelOrderRoute::<SqliteDatabase>::new())
            .service(AddTrackingRoute::<SqliteDatabase>::new())
            .service(OrderTrackingRoute::<SqliteDatabase>::new())
            .service(OrderRoute::<SqliteDatabase>::new())
            .service(UsersRoute::<SqliteDatabase>::new())
            .service(UserRoleRoute::<SqliteDatabase>::new())
            .service(UpdateRoleRoute::<SqliteDatabase>::new())
            .service(DeleteUserRoute::<SqliteDatabase>::new())
            .service(ProfileRoute::<SqliteDatabase>::new())
            .service(UpdateProfileRoute::<SqliteDatabase>::new())
            .service(SuspendUserRoute::<SqliteDatabase>::new())
            .service(SuspensionsRoute::<SqliteDatabase>::new())
            .service(RecordPaymentRoute::<SqliteDatabase>::new())
            .service(PaymentForOrderRoute::<SqliteDatabase>::new());
        let webhook_scope = web::scope("/webhook")
            .wrap(HmacMiddlewareFactory::new("x-slm-signature", webhook_key.clone(), webhook_enabled))
            .service(PaymentWebhookRoute::<SqliteDatabase>::new());
        // The public catalog and registration endpoints share the /api prefix but sit outside the
        // authenticated scope, so they must be registered ahead of it.
        app.service(health)
            .service(AuthRoute::<SqliteDatabase>::new())
            .service(RegisterRoute::<SqliteDatabase>::new())
            .service(ProductStatsRoute::<SqliteDatabase>::new())
            .service(ProductCategoriesRoute::<SqliteDatabase>::new())
            .service(ProductsRoute::<SqliteDatabase>::new())
            .service(ProductRoute::<SqliteDatabase>::new())
            .service(auth_scope)
            .service(webhook_scope)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .shutdown_timeout(config.shutdown_grace_period)
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}
