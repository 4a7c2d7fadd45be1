//! The two resolution stages and the HTML patterns they share.

pub mod extract;
mod listing;
mod profile;

pub use listing::ListingResolver;
pub use profile::HandleResolver;
