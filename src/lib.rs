//! The Rust SDK for Annecy Media, an offerwall that rewards users for engaging with offers.
//!
//! # Overview
//!
//! The SDK revolves around an [`Engine`] that fetches [`Offer`]s for a user, tracks which offers
//! are actually seen on screen, and periodically reports those views back to the API.
//!
//! Some offers are *lazy*: their real tracking URL is only known after a second call. The engine
//! resolves lazy offers in the background and hands the patched list to a
//! [`LazyOffersListener`]. When offers are fetched again before a lazy call finishes, its result
//! is dropped.
//!
//! UI elements displaying offers register as [`VisibilityChecker`]s. After every scroll the engine
//! asks them whether they are on screen and records a view for each visible offer. Views are
//! deduplicated per session and sent in batches every 30 seconds and whenever the app goes to
//! background.
//!
//! ```no_run
//! # async fn run() -> annecy::Result<()> {
//! use annecy::{ClientConfig, Configuration, Offer};
//!
//! let engine = ClientConfig::new().to_engine()?;
//! engine.init(
//!     Configuration::new()
//!         .with_country("US")
//!         .with_locale("en")
//!         .with_token("annecy-media-token")
//!         .with_user_id("1"),
//! );
//! engine.start();
//!
//! let offers = engine
//!     .get_offers(|patched: &[Offer]| {
//!         // Re-render the list with resolved lazy offers.
//!     })
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Delivery guarantees
//!
//! Views are reported at most once. A batch is marked as sent before its request starts and is
//! not retried if the request fails.
//!
//! # Error Handling
//!
//! Errors are represented by the [`Error`] enum. Only [`Engine::get_offers`] and
//! [`Engine::flush_views`] return errors; background work (lazy calls, periodic flushes) logs
//! failures and carries on.
//!
//! # Logging
//!
//! The package uses the [`log`](https://docs.rs/log/latest/log/) crate for logging
//! messages. Consider integrating a `log`-compatible logger implementation for better visibility
//! into SDK operations.

#![warn(rustdoc::missing_crate_level_docs)]
#![warn(missing_docs)]

mod checker;
mod clock;
mod config;
mod configuration;
mod engine;
mod error;
mod lazy_offer;
mod offer;
mod response;
mod scheduler;
mod transport;
mod views;

#[cfg(test)]
mod testing;

pub use checker::{Frame, LazyOffersListener, VisibilityChecker, ON_SCREEN_PADDING};
pub use clock::{Clock, SystemClock};
pub use config::ClientConfig;
pub use configuration::Configuration;
pub use engine::{Engine, Flush};
pub use error::{Error, Result};
pub use lazy_offer::{LazyField, LazyOffer};
pub use offer::Offer;
pub use scheduler::AppState;
pub use transport::{HttpTransport, Request, Target, Transport};
pub use views::TrackedView;
