use anyhow::Result;

// Print the OpenAPI document for the service, for CI artifacts and docs.
fn main() -> Result<()> {
    println!("{}", firma::api::openapi().to_pretty_json()?);

    Ok(())
}
