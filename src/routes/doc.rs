use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        orders::{
            OrderList, PrecreateOrderRequest, SaveOrderRequest, SavedOrder, VerifyPaymentData,
            VerifyPaymentRequest,
        },
        webhooks::WebhookOutcome,
    },
    gateway::GatewayOrderDescriptor,
    models::{Order, Profile},
    response::{ApiResponse, Meta},
    routes::{health, orders, webhooks},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        orders::precreate_order,
        orders::save_order,
        orders::list_orders,
        orders::verify_payment,
        webhooks::gateway_webhook
    ),
    components(
        schemas(
            Order,
            Profile,
            GatewayOrderDescriptor,
            PrecreateOrderRequest,
            SaveOrderRequest,
            SavedOrder,
            OrderList,
            VerifyPaymentRequest,
            VerifyPaymentData,
            WebhookOutcome,
            Meta,
            ApiResponse<GatewayOrderDescriptor>,
            ApiResponse<SavedOrder>,
            ApiResponse<OrderList>,
            ApiResponse<VerifyPaymentData>,
            ApiResponse<WebhookOutcome>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Orders", description = "Order pre-creation, payment callback and verification"),
        (name = "Webhooks", description = "Gateway server-to-server notifications"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
