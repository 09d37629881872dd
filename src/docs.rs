use utoipa::OpenApi;
use crate::{error, handlers, models};

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::create_session,
        handlers::get_session,
        handlers::call_session,
        handlers::delete_session,
        handlers::list_methods,
    ),
    components(
        schemas(
            models::BridgeCall,
            models::BridgeResponse,
            models::Outcome,
            models::Session,
            models::SessionCreated,
            models::Credentials,
            models::DeviceDescriptor,
            models::DeviceStatus,
            error::ErrorCode,
            error::ErrorBody,
        )
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn documents_session_routes() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/api/sessions"));
        assert!(doc.paths.paths.contains_key("/api/sessions/{id}/calls"));
    }
}
