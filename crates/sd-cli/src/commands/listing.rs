//! Distinct-value listings.

use sd_ldap::{Directory, DirectoryService};

use crate::cli::ListingKind;
use crate::config::OutputFormat;
use crate::output::output_values;

/// Runs a listing command.
pub async fn run_listing(
    kind: ListingKind,
    service: &DirectoryService,
    conn: &mut dyn Directory,
    output_format: OutputFormat,
) -> crate::CliResult<()> {
    let values = service.listing(conn, kind.into()).await?;
    output_values(&values, output_format)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing;
    use sd_ldap::Listing;

    #[tokio::test]
    async fn test_locations_listing() {
        let service = testing::service();
        let mut dir = testing::directory();

        run_listing(ListingKind::Locations, &service, &mut dir, OutputFormat::Json)
            .await
            .unwrap();

        let values = service.listing(&mut dir, Listing::Locations).await.unwrap();
        assert_eq!(values, ["Berlin"]);
    }
}
