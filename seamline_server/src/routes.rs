//! Request handler definitions
//!
//! Define each route and it handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause the
//! current worker to stop processing new requests:
//! ```nocompile
//!     fn my_handler() -> impl Responder {
//!         std::thread::sleep(Duration::from_secs(5)); // <-- Bad practice! Will cause the current worker thread to
//! hang!
//!     }
//! ```
//! For this reason, any long, non-cpu-bound operation (e.g. I/O, database operations, etc.) should be expressed as
//! futures or asynchronous functions. Async handlers get executed concurrently by worker threads and thus don’t block
//! execution:
//!
//! ```nocompile
//!     async fn my_handler() -> impl Responder {
//!         tokio::time::sleep(Duration::from_secs(5)).await; // <-- Ok. Worker thread will handle other requests here
//!     }
//! ```

use actix_web::{get, web, HttpRequest, HttpResponse, Responder};
use log::*;
use seamline_engine::{
    catalog_objects::{ProductQueryFilter, ProductUpdate},
    db_types::{
        AccountStatus,
        NewOrder,
        NewPayment,
        NewProduct,
        NewSuspension,
        NewTrackingUpdate,
        NewUser,
        OrderStatusType,
        Role,
    },
    order_objects::OrderQueryFilter,
    traits::{CatalogManagement, OrderManagement, PaymentApiError, PaymentManagement, UserManagement},
    user_objects::ProfileUpdate,
    CatalogApi,
    OrderFlowApi,
    PaymentApi,
    UserApi,
};
use serde_json::json;

use crate::{
    auth::{check_login_token_signature, JwtClaims, TokenIssuer},
    config::{AuthConfig, ServerOptions},
    data_objects::{
        BulkShowOnHomeParams,
        JsonResponse,
        OrderSearchParams,
        RoleUpdateRequest,
        ShowOnHomeParams,
        UserSearchParams,
    },
    errors::{AuthError, ServerError},
    helpers::get_remote_ip,
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]<A>(core::marker::PhantomData<fn() -> A>);}
        paste::paste! { impl<A> [<$name:camel Route>]<A> {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self(core::marker::PhantomData::<fn() -> A>)
            }
        }}
        paste::paste! { impl<A> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<A>
        where
            A: $($bounds +)+ 'static,
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::<A>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };

    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+ where requires [$($roles:expr),+]) => {
        paste::paste! { pub struct [<$name:camel Route>]<A>(core::marker::PhantomData<fn() -> A>);}
        paste::paste! { impl<A> [<$name:camel Route>]<A> {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self(core::marker::PhantomData::<fn() -> A>)
            }
        }}
        paste::paste! { impl<A> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<A>
        where
            A: $($bounds +)+ 'static,
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::<A>)
                    .wrap($crate::middleware::AclMiddlewareFactory::new(&[$($roles),+]));
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Auth  ----------------------------------------------------

route!(auth => Post "/auth" impl UserManagement);
/// Route handler for the auth endpoint
///
/// This route is used to exchange a login token for an access token.
///
/// Clients must supply the login token in the `slm_auth_token` header. The token is issued by
/// the identity provider and signed with the shared identity secret; it identifies the account
/// but carries no role. The role placed in the access token is always the one on record for the
/// account, so a role change takes effect the next time the user signs in.
///
/// Suspended accounts are refused here, which cuts off new sessions without touching tokens that
/// are already in flight (they lapse on their own expiry).
pub async fn auth<A>(
    req: HttpRequest,
    api: web::Data<UserApi<A>>,
    signer: web::Data<TokenIssuer>,
    auth_config: web::Data<AuthConfig>,
) -> Result<HttpResponse, ServerError>
where
    A: UserManagement,
{
    trace!("💻️ Received auth request");
    let payload = req.headers().get("slm_auth_token").ok_or(ServerError::CouldNotDeserializeAuthToken)?;
    let login_token = payload.to_str().map_err(|e| {
        debug!("💻️ Could not read auth token. {e}");
        ServerError::CouldNotDeserializeAuthToken
    })?;
    let token = check_login_token_signature(login_token, auth_config.as_ref())?;
    debug!("💻️ Login token was validated for {}", token.sub);
    let user = api
        .user_by_uid(&token.sub)
        .await
        .map_err(|e| {
            debug!("💻️ Could not look up account for {}. {e}", token.sub);
            ServerError::BackendError(e.to_string())
        })?
        .ok_or(ServerError::AuthenticationError(AuthError::AccountNotFound))?;
    if user.status == AccountStatus::Suspended {
        info!("💻️ Suspended account {} was refused a new access token", user.uid);
        return Err(ServerError::AuthenticationError(AuthError::AccountSuspended));
    }
    let access_token = signer.issue_token(&user)?;
    trace!("💻️ Issued access token for {}", user.uid);
    Ok(HttpResponse::Ok().json(json!({ "token": access_token })))
}

route!(register => Post "/api/register" impl UserManagement);
/// Route handler for the register endpoint
///
/// Creates the account record for the identity in the supplied login token. Registration is
/// idempotent: repeating the call returns the existing record without modifying it, so clients
/// can safely register on every sign-in.
pub async fn register<A: UserManagement>(
    req: HttpRequest,
    api: web::Data<UserApi<A>>,
    auth_config: web::Data<AuthConfig>,
) -> Result<HttpResponse, ServerError> {
    trace!("💻️ Received registration request");
    let payload = req.headers().get("slm_auth_token").ok_or(ServerError::CouldNotDeserializeAuthToken)?;
    let login_token = payload.to_str().map_err(|e| {
        debug!("💻️ Could not read auth token. {e}");
        ServerError::CouldNotDeserializeAuthToken
    })?;
    let token = check_login_token_signature(login_token, auth_config.as_ref())?;
    let mut user = NewUser::new(token.sub, token.name, token.email);
    user.photo_url = token.photo_url;
    let (user, created) = api.register(user).await?;
    if created {
        info!("💻️ New account registered for {}", user.email);
    }
    Ok(HttpResponse::Ok().json(user))
}

//----------------------------------------------   Catalog  ----------------------------------------------------

route!(products => Get "/api/products" impl CatalogManagement);
/// Route handler for the public product listing
///
/// Accepts the full search grammar as query parameters: `search_text`, `category`, `min_price` /
/// `max_price` (minor units), `show_on_home`, `sort_by`, `sort_order`, `page` and `limit`.
pub async fn products<B: CatalogManagement>(
    query: web::Query<ProductQueryFilter>,
    api: web::Data<CatalogApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let query = query.into_inner();
    debug!("💻️ GET products ({query:?})");
    let list = api.search(query).await?;
    Ok(HttpResponse::Ok().json(list))
}

route!(product_stats => Get "/api/products/stats" impl CatalogManagement);
pub async fn product_stats<B: CatalogManagement>(api: web::Data<CatalogApi<B>>) -> Result<HttpResponse, ServerError> {
    debug!("💻️ GET product stats");
    let stats = api.stats().await?;
    Ok(HttpResponse::Ok().json(stats))
}

route!(product_categories => Get "/api/products/categories" impl CatalogManagement);
pub async fn product_categories<B: CatalogManagement>(
    api: web::Data<CatalogApi<B>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ GET product categories");
    let categories = api.categories().await?;
    Ok(HttpResponse::Ok().json(categories))
}

// The numeric constraint keeps this public route from shadowing /products/my inside the
// authenticated scope.
route!(product => Get "/api/products/{id:\\d+}" impl CatalogManagement);
pub async fn product<B: CatalogManagement>(
    path: web::Path<i64>,
    api: web::Data<CatalogApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let id = path.into_inner();
    debug!("💻️ GET product {id}");
    let product = api.fetch_product(id).await?.ok_or_else(|| ServerError::NoRecordFound(format!("Product {id}")))?;
    Ok(HttpResponse::Ok().json(product))
}

route!(my_products => Get "/products/my" impl CatalogManagement where requires [Role::Manager, Role::Admin]);
/// Route handler for the products/my endpoint
///
/// Returns every product owned by the calling manager, optionally narrowed with `?search=`.
pub async fn my_products<B: CatalogManagement>(
    claims: JwtClaims,
    query: web::Query<UserSearchParams>,
    api: web::Data<CatalogApi<B>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ GET my_products for {}", claims.sub);
    let products = api.my_products(&claims.sub, query.into_inner().search).await?;
    Ok(HttpResponse::Ok().json(products))
}

route!(create_product => Post "/products" impl CatalogManagement where requires [Role::Manager, Role::Admin]);
/// Route handler for listing a new product
///
/// The manager snapshot on the listing (uid, name, email) is taken from the verified claims,
/// never from the request body.
pub async fn create_product<B: CatalogManagement>(
    claims: JwtClaims,
    body: web::Json<NewProduct>,
    api: web::Data<CatalogApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let product = body.into_inner().with_manager(claims.sub.clone(), claims.name.clone(), claims.email.clone());
    info!("💻️ New product listing \"{}\" from {}", product.name, claims.email);
    let product = api.create_product(product).await.map_err(|e| {
        debug!("💻️ Could not create product. {e}");
        e
    })?;
    Ok(HttpResponse::Ok().json(product))
}

route!(update_product => Patch "/products/{id}" impl CatalogManagement where requires [Role::Manager, Role::Admin]);
pub async fn update_product<B: CatalogManagement>(
    claims: JwtClaims,
    path: web::Path<i64>,
    body: web::Json<ProductUpdate>,
    api: web::Data<CatalogApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let id = path.into_inner();
    debug!("💻️ PATCH product {id} by {}", claims.sub);
    let product = api.update_product(id, body.into_inner(), &claims.sub, claims.role).await?;
    Ok(HttpResponse::Ok().json(product))
}

route!(delete_product => Delete "/products/{id}" impl CatalogManagement where requires [Role::Manager, Role::Admin]);
pub async fn delete_product<B: CatalogManagement>(
    claims: JwtClaims,
    path: web::Path<i64>,
    api: web::Data<CatalogApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let id = path.into_inner();
    info!("💻️ DELETE product {id} by {}", claims.sub);
    let product = api.delete_product(id, &claims.sub, claims.role).await?;
    Ok(HttpResponse::Ok().json(product))
}

route!(set_show_on_home => Patch "/products/{id}/show-on-home" impl CatalogManagement where requires [Role::Admin]);
pub async fn set_show_on_home<B: CatalogManagement>(
    path: web::Path<i64>,
    body: web::Json<ShowOnHomeParams>,
    api: web::Data<CatalogApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let id = path.into_inner();
    let ShowOnHomeParams { show } = body.into_inner();
    debug!("💻️ PATCH show_on_home({show}) for product {id}");
    let product = api.set_show_on_home(id, show).await?;
    Ok(HttpResponse::Ok().json(product))
}

route!(bulk_show_on_home => Patch "/products/show-on-home" impl CatalogManagement where requires [Role::Admin]);
/// Route handler for bulk homepage curation
///
/// Flips the homepage flag for every id in the batch in one statement. Unknown ids are skipped;
/// the response reports how many rows actually changed.
pub async fn bulk_show_on_home<B: CatalogManagement>(
    body: web::Json<BulkShowOnHomeParams>,
    api: web::Data<CatalogApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let BulkShowOnHomeParams { ids, show } = body.into_inner();
    debug!("💻️ PATCH show_on_home({show}) for {} products", ids.len());
    let updated = api.bulk_set_show_on_home(&ids, show).await?;
    Ok(HttpResponse::Ok().json(json!({ "updated": updated })))
}

//----------------------------------------------   Orders  ----------------------------------------------------

route!(place_order => Post "/orders" impl OrderManagement, CatalogManagement where requires [Role::Buyer]);
/// Route handler for placing a new order
///
/// The buyer identity on the order is taken from the verified claims. Stock is reserved and the
/// unit price frozen as part of creation, so a success response means the quantity is held for
/// this order no matter what happens to the listing afterwards.
pub async fn place_order<B>(
    claims: JwtClaims,
    body: web::Json<NewOrder>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError>
where
    B: OrderManagement + CatalogManagement,
{
    let order = body.into_inner().for_buyer(claims.sub.clone(), claims.email.clone());
    info!("💻️ New order for product {} from {}", order.product_id, claims.email);
    let order = api.place_order(order).await.map_err(|e| {
        debug!("💻️ Could not place order. {e}");
        e
    })?;
    Ok(HttpResponse::Ok().json(order))
}

route!(my_orders => Get "/orders/my" impl OrderManagement, CatalogManagement where requires [Role::Buyer]);
pub async fn my_orders<B>(claims: JwtClaims, api: web::Data<OrderFlowApi<B>>) -> Result<HttpResponse, ServerError>
where B: OrderManagement + CatalogManagement {
    debug!("💻️ GET my_orders for {}", claims.sub);
    let filter = OrderQueryFilter::default().with_buyer(claims.sub.clone());
    let orders = api.search_orders(filter).await?;
    Ok(HttpResponse::Ok().json(orders))
}

route!(search_orders => Get "/orders" impl OrderManagement, CatalogManagement where requires [Role::Manager, Role::Admin]);
/// Route handler for the order search endpoint
///
/// Admins see every order matching the filter; managers only ever see orders for their own
/// products, whatever the query string says.
pub async fn search_orders<B>(
    claims: JwtClaims,
    query: web::Query<OrderSearchParams>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError>
where
    B: OrderManagement + CatalogManagement,
{
    let mut filter = query.into_inner().into_filter();
    if claims.role == Role::Manager {
        filter = filter.with_manager(claims.sub.clone());
    }
    debug!("💻️ GET orders. {filter}");
    let orders = api.search_orders(filter).await?;
    Ok(HttpResponse::Ok().json(orders))
}

route!(pending_orders => Get "/orders/status/pending" impl OrderManagement, CatalogManagement where requires [Role::Manager, Role::Admin]);
pub async fn pending_orders<B>(claims: JwtClaims, api: web::Data<OrderFlowApi<B>>) -> Result<HttpResponse, ServerError>
where B: OrderManagement + CatalogManagement {
    orders_with_status(claims, OrderStatusType::Pending, api.as_ref()).await
}

route!(approved_orders => Get "/orders/status/approved" impl OrderManagement, CatalogManagement where requires [Role::Manager, Role::Admin]);
pub async fn approved_orders<B>(claims: JwtClaims, api: web::Data<OrderFlowApi<B>>) -> Result<HttpResponse, ServerError>
where B: OrderManagement + CatalogManagement {
    orders_with_status(claims, OrderStatusType::Approved, api.as_ref()).await
}

async fn orders_with_status<B>(
    claims: JwtClaims,
    status: OrderStatusType,
    api: &OrderFlowApi<B>,
) -> Result<HttpResponse, ServerError>
where
    B: OrderManagement + CatalogManagement,
{
    debug!("💻️ GET {status} orders for {}", claims.sub);
    let mut filter = OrderQueryFilter::default().with_status(status);
    if claims.role == Role::Manager {
        filter = filter.with_manager(claims.sub.clone());
    }
    let orders = api.search_orders(filter).await?;
    Ok(HttpResponse::Ok().json(orders))
}

route!(order => Get "/orders/{id}" impl OrderManagement, CatalogManagement);
/// Route handler for fetching a single order
///
/// Visible to the buyer who placed the order, the manager who owns the product, and admins.
/// Everyone else receives a 403, including for ids that do not exist.
pub async fn order<B>(
    claims: JwtClaims,
    path: web::Path<i64>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError>
where
    B: OrderManagement + CatalogManagement,
{
    let id = path.into_inner();
    debug!("💻️ GET order {id} for {}", claims.sub);
    let order = api.fetch_order(id, &claims.sub, claims.role).await?;
    Ok(HttpResponse::Ok().json(order))
}

route!(approve_order => Patch "/orders/{id}/approve" impl OrderManagement, CatalogManagement where requires [Role::Manager, Role::Admin]);
pub async fn approve_order<B>(
    claims: JwtClaims,
    path: web::Path<i64>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError>
where
    B: OrderManagement + CatalogManagement,
{
    let id = path.into_inner();
    info!("💻️ Approve order request for {id} from {}", claims.sub);
    let order = api.approve_order(id, &claims.sub, claims.role).await.map_err(|e| {
        debug!("💻️ Could not approve order. {e}");
        e
    })?;
    Ok(HttpResponse::Ok().json(order))
}

route!(reject_order => Patch "/orders/{id}/reject" impl OrderManagement, CatalogManagement where requires [Role::Manager, Role::Admin]);
/// Order rejection
///
/// Rejection is the only transition that returns reserved stock to the listing. The restore and
/// the status change are one atomic unit, so a success response means the units are sellable
/// again.
pub async fn reject_order<B>(
    claims: JwtClaims,
    path: web::Path<i64>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError>
where
    B: OrderManagement + CatalogManagement,
{
    let id = path.into_inner();
    info!("💻️ Reject order request for {id} from {}", claims.sub);
    let order = api.reject_order(id, &claims.sub, claims.role).await.map_err(|e| {
        debug!("💻️ Could not reject order. {e}");
        e
    })?;
    Ok(HttpResponse::Ok().json(order))
}

route!(cancel_order => Patch "/orders/{id}/cancel" impl OrderManagement, CatalogManagement where requires [Role::Buyer]);
/// Order cancellation, by the buyer who placed the order, while it is still pending.
///
/// Cancellation does not return stock; only a manager's rejection does.
pub async fn cancel_order<B>(
    claims: JwtClaims,
    path: web::Path<i64>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError>
where
    B: OrderManagement + CatalogManagement,
{
    let id = path.into_inner();
    info!("💻️ Cancel order request for {id} from {}", claims.sub);
    let order = api.cancel_order(id, &claims.sub, claims.role).await.map_err(|e| {
        debug!("💻️ Could not cancel order. {e}");
        e
    })?;
    Ok(HttpResponse::Ok().json(order))
}

//----------------------------------------------   Tracking  ----------------------------------------------------

route!(add_tracking => Post "/orders/{id}/tracking" impl OrderManagement, CatalogManagement where requires [Role::Manager, Role::Admin]);
/// Route handler for appending a fulfilment update to an order
///
/// Only approved orders accept tracking updates. The log is append-only; stages may arrive out
/// of order or repeat, and the derived timeline absorbs both.
pub async fn add_tracking<B>(
    claims: JwtClaims,
    path: web::Path<i64>,
    body: web::Json<NewTrackingUpdate>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError>
where
    B: OrderManagement + CatalogManagement,
{
    let id = path.into_inner();
    let update = body.into_inner();
    info!("💻️ Tracking update for order {id}: {} at {}", update.stage, update.location);
    let entry = api.add_tracking(id, &claims.sub, claims.role, update).await.map_err(|e| {
        debug!("💻️ Could not add tracking update. {e}");
        e
    })?;
    Ok(HttpResponse::Ok().json(entry))
}

route!(order_tracking => Get "/orders/{id}/tracking" impl OrderManagement, CatalogManagement);
pub async fn order_tracking<B>(
    claims: JwtClaims,
    path: web::Path<i64>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError>
where
    B: OrderManagement + CatalogManagement,
{
    let id = path.into_inner();
    debug!("💻️ GET tracking for order {id}");
    let timeline = api.tracking_timeline(id, &claims.sub, claims.role).await?;
    Ok(HttpResponse::Ok().json(timeline))
}

//----------------------------------------------   Users  ----------------------------------------------------

route!(users => Get "/users" impl UserManagement where requires [Role::Admin]);
pub async fn users<B: UserManagement>(
    query: web::Query<UserSearchParams>,
    api: web::Data<UserApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let search = query.into_inner().search;
    debug!("💻️ GET users");
    let users = api.search_users(search.as_deref()).await?;
    Ok(HttpResponse::Ok().json(users))
}

route!(user_role => Get "/users/{email}/role" impl UserManagement);
pub async fn user_role<B: UserManagement>(
    path: web::Path<String>,
    api: web::Data<UserApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let email = path.into_inner();
    debug!("💻️ GET role for {email}");
    let user =
        api.user_by_email(&email).await?.ok_or_else(|| ServerError::NoRecordFound(format!("User {email}")))?;
    Ok(HttpResponse::Ok().json(json!({ "email": user.email, "role": user.role })))
}

route!(update_role => Patch "/users/{id}/role" impl UserManagement where requires [Role::Admin]);
/// Route handler for role changes
///
/// The new role lands in the user record immediately, but access tokens already in circulation
/// keep their old role until they expire and the user signs in again.
pub async fn update_role<B: UserManagement>(
    path: web::Path<i64>,
    body: web::Json<RoleUpdateRequest>,
    api: web::Data<UserApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let id = path.into_inner();
    let RoleUpdateRequest { role } = body.into_inner();
    info!("💻️ PATCH role {role} for user {id}");
    let user = api.update_role(id, role).await?;
    Ok(HttpResponse::Ok().json(user))
}

route!(delete_user => Delete "/users/{id}" impl UserManagement where requires [Role::Admin]);
pub async fn delete_user<B: UserManagement>(
    path: web::Path<i64>,
    api: web::Data<UserApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let id = path.into_inner();
    info!("💻️ DELETE user {id}");
    let user = api.delete_user(id).await?;
    Ok(HttpResponse::Ok().json(user))
}

route!(profile => Get "/profile" impl UserManagement);
pub async fn profile<B: UserManagement>(
    claims: JwtClaims,
    api: web::Data<UserApi<B>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ GET profile for {}", claims.sub);
    let user = api.profile(&claims.sub).await?;
    Ok(HttpResponse::Ok().json(user))
}

route!(update_profile => Patch "/profile" impl UserManagement);
pub async fn update_profile<B: UserManagement>(
    claims: JwtClaims,
    body: web::Json<ProfileUpdate>,
    api: web::Data<UserApi<B>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ PATCH profile for {}", claims.sub);
    let user = api.update_profile(&claims.sub, body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(user))
}

//----------------------------------------------   Suspensions  ----------------------------------------------------

route!(suspend_user => Post "/suspensions" impl UserManagement where requires [Role::Admin]);
/// Route handler for suspending an account
///
/// The suspension takes effect at the next token issue: the account keeps its history, but
/// `/auth` refuses it until an admin reinstates the record.
pub async fn suspend_user<B: UserManagement>(
    claims: JwtClaims,
    body: web::Json<NewSuspension>,
    api: web::Data<UserApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let mut suspension = body.into_inner();
    suspension.suspended_by = claims.email.clone();
    info!("💻️ Suspension request for user {} by {}", suspension.user_id, claims.email);
    let suspension = api.suspend_user(suspension).await?;
    Ok(HttpResponse::Ok().json(suspension))
}

route!(suspensions => Get "/suspensions/{user_id}" impl UserManagement);
pub async fn suspensions<B: UserManagement>(
    path: web::Path<i64>,
    api: web::Data<UserApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let user_id = path.into_inner();
    debug!("💻️ GET suspensions for user {user_id}");
    let records = api.suspensions_for_user(user_id).await?;
    Ok(HttpResponse::Ok().json(records))
}

//----------------------------------------------   Payments  ----------------------------------------------------

route!(record_payment => Post "/payments" impl PaymentManagement, OrderManagement where requires [Role::Buyer]);
/// Route handler for a buyer-submitted payment capture
///
/// The order must belong to the caller, require an online payment, and the amount must match the
/// frozen order price exactly. Submitting the same transaction id twice returns the stored
/// record unchanged, so client retries are harmless.
pub async fn record_payment<B>(
    claims: JwtClaims,
    body: web::Json<NewPayment>,
    api: web::Data<PaymentApi<B>>,
) -> Result<HttpResponse, ServerError>
where
    B: PaymentManagement + OrderManagement,
{
    let mut payment = body.into_inner();
    payment.customer_email = claims.email.clone();
    info!("💻️ Payment capture for order {} from {}", payment.order_id, claims.email);
    let payment = api.record_payment(&claims.sub, payment).await.map_err(|e| {
        debug!("💻️ Could not record payment. {e}");
        e
    })?;
    Ok(HttpResponse::Ok().json(payment))
}

route!(payment_for_order => Get "/payments/{order_id}" impl PaymentManagement, OrderManagement, CatalogManagement);
pub async fn payment_for_order<B>(
    claims: JwtClaims,
    path: web::Path<i64>,
    orders: web::Data<OrderFlowApi<B>>,
    api: web::Data<PaymentApi<B>>,
) -> Result<HttpResponse, ServerError>
where
    B: PaymentManagement + OrderManagement + CatalogManagement,
{
    let order_id = path.into_inner();
    debug!("💻️ GET payment_for_order({order_id})");
    // The payment inherits the order's visibility rules, so resolve the order first.
    orders.fetch_order(order_id, &claims.sub, claims.role).await?;
    let payment = api.payment_for_order(order_id).await?;
    Ok(HttpResponse::Ok().json(payment))
}

//------------------------------------------   Incoming payments  ---------------------------------------------

route!(payment_webhook => Post "/payment" impl PaymentManagement, OrderManagement, CatalogManagement);
/// Route handler for payment confirmations from the gateway
///
/// The HMAC middleware has already authenticated the request body by the time this handler runs.
/// Confirmations are idempotent on the transaction id, so replayed deliveries are answered with
/// the same success response. When auto-approval is configured, a confirmed payment moves the
/// order straight to approved; failures there are logged but never bubble back to the gateway,
/// which would otherwise keep re-delivering a payment that was recorded perfectly well.
pub async fn payment_webhook<B>(
    req: HttpRequest,
    options: web::Data<ServerOptions>,
    orders: web::Data<OrderFlowApi<B>>,
    api: web::Data<PaymentApi<B>>,
    body: web::Json<NewPayment>,
) -> HttpResponse
where
    B: PaymentManagement + OrderManagement + CatalogManagement,
{
    trace!("💻️ Received payment confirmation from gateway");
    let payment = body.into_inner();
    let peer = get_remote_ip(&req, options.use_x_forwarded_for, options.use_forwarded);
    info!("💻️ Payment confirmation for order {} received from IP {peer:?}.", payment.order_id);
    let result = match api.confirm_payment(payment).await {
        Ok((payment, order)) => {
            info!("💻️ Payment {} confirmed for order {}.", payment.transaction_id, order.id);
            if options.auto_approve_on_payment {
                match orders.approve_on_payment(order.id).await {
                    Ok(Some(order)) => info!("💻️ Order {} was auto-approved on payment.", order.id),
                    Ok(None) => debug!("💻️ Order {} was not eligible for auto-approval.", order.id),
                    Err(e) => warn!("💻️ Could not auto-approve order {}. {e}", order.id),
                }
            }
            JsonResponse::success(format!("Payment {} confirmed.", payment.transaction_id))
        },
        Err(PaymentApiError::DatabaseError(e)) => {
            warn!("💻️ Could not process payment confirmation. {e}");
            JsonResponse::failure("Unexpected error handling payment.")
        },
        Err(e) => {
            info!("💻️ Payment confirmation rejected. {e}");
            JsonResponse::failure(e)
        },
    };
    HttpResponse::Ok().json(result)
}
