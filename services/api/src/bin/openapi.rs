//! services/api/src/bin/openapi.rs
//!
//! Writes the OpenAPI document of the PharmaCheck API to `openapi.json`, or to
//! the path given as the first argument.

use api_lib::web::rest::ApiDoc;
use utoipa::OpenApi;

const DEFAULT_OUTPUT: &str = "openapi.json";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_OUTPUT.to_string());

    let doc = ApiDoc::openapi();
    let route_count = doc.paths.paths.len();
    std::fs::write(&path, doc.to_pretty_json()?)?;

    println!("Wrote {} routes to {}", route_count, path);
    Ok(())
}
