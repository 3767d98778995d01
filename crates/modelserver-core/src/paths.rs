//! Path constants of the model server REST API, relative to the base URL.
//!
//! Model identifiers are free-form URIs (embedded `#` and `/` included) and
//! therefore always travel as a percent-encoded `modeluri` query parameter.
//! These constants stay literal path segments.

/// Model CRUD endpoint.
pub const MODEL_CRUD: &str = "models";

/// Type schema endpoint.
pub const SCHEMA: &str = "schema";

/// Edit-command endpoint.
pub const EDIT: &str = "edit";

/// Workspace configuration endpoint.
pub const SERVER_CONFIGURE: &str = "server/configure";

/// Liveness probe endpoint.
pub const SERVER_PING: &str = "server/ping";

/// WebSocket subscription endpoint.
pub const SUBSCRIPTION: &str = "subscribe";

/// Query parameter carrying the model identifier.
pub const MODEL_URI_PARAMETER: &str = "modeluri";
