//! Directory-listing retrieval and archive link extraction.
//!
//! [`fetch_listing`] performs the single GET of the listing page;
//! [`Listing::entries`] turns the document into an ordered, lazy sequence of
//! [`RemoteEntry`] values.

mod links;
mod suffix;

use tracing::{info, instrument};
use url::Url;

use crate::download::{NetworkError, Transport};

pub use links::{Listing, ListingEntries, RemoteEntry, extract_links};
pub use suffix::{DEFAULT_SUFFIX, SuffixError, TargetSuffix};

/// Retrieves the listing document at `base_url`.
///
/// Exactly one request is issued; there are no retries. Relative links in
/// the returned [`Listing`] resolve against the URL the document was finally
/// served from (after redirects).
///
/// # Errors
///
/// Returns [`NetworkError`] if the host is unreachable, the request times
/// out, or the server answers with a non-success status.
#[instrument(skip(transport), fields(base_url = %base_url))]
pub async fn fetch_listing(
    transport: &dyn Transport,
    base_url: &Url,
) -> Result<Listing, NetworkError> {
    let document = transport.fetch_document(base_url).await?;
    info!(
        bytes = document.body.len(),
        served_from = %document.url,
        "fetched listing"
    );
    Ok(Listing::new(document.url, document.body))
}
