use crate::{
    api::{
        handlers::{health, login, protected, risk, signup},
        types::{ApiResponse, RiskRequest, SignupRequest},
    },
    lock::Verification,
    risk::{Determination, RiskEvent, RiskParameters},
};
use utoipa::{
    openapi::security::{Http, HttpAuthScheme, SecurityScheme},
    Modify, OpenApi,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        signup::signup,
        login::login,
        risk::risk,
        protected::protected,
    ),
    components(schemas(
        ApiResponse,
        SignupRequest,
        RiskRequest,
        RiskEvent,
        RiskParameters,
        Determination,
        Verification,
        health::Health,
    )),
    modifiers(&LockedTokenScheme),
    tags(
        (name = "auth", description = "Signup and login gated by fraud risk"),
        (name = "protected", description = "Resources behind locked-token verification"),
        (name = "risk", description = "Risk classification"),
        (name = "health", description = "Service health"),
    )
)]
pub struct ApiDoc;

struct LockedTokenScheme;

impl Modify for LockedTokenScheme {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "locked_token",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            );
        }
    }
}
