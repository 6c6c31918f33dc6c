use serde::{Deserialize, Serialize};

use crate::Offer;

/// A UI element that can report whether its offer is on screen.
///
/// Register checkers with [`Engine::add_tracking_checker`](crate::Engine::add_tracking_checker).
/// On every visibility tick after a scroll (or any other event that may have changed what is on
/// screen), the engine asks each checker whether it is visible. A visible checker gets its offer
/// tracked and is deregistered.
pub trait VisibilityChecker: Send + Sync {
    /// Identifier of the offer the element displays.
    fn offer_id(&self) -> &str;

    /// Whether the element is currently on screen.
    fn is_visible(&self) -> bool;
}

/// Notified with the full offer list whenever a lazy call patches it.
pub trait LazyOffersListener: Send + Sync {
    /// Called with the current offer list, including non-lazy offers.
    fn on_lazy_offers_loaded(&self, offers: &[Offer]);
}

impl<T: Fn(&[Offer]) + Send + Sync> LazyOffersListener for T {
    fn on_lazy_offers_loaded(&self, offers: &[Offer]) {
        self(offers);
    }
}

/// Inset applied to an element frame before checking it against the window.
pub const ON_SCREEN_PADDING: f64 = 5.0;

/// Position and size of an element in window coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Frame {
    /// Left edge.
    pub x: f64,
    /// Top edge.
    pub y: f64,
    /// Width.
    pub width: f64,
    /// Height.
    pub height: f64,
}

impl Frame {
    /// Create a frame.
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Frame {
        Frame {
            x,
            y,
            width,
            height,
        }
    }

    /// Whether the frame, shrunk by `padding` on every side, lies strictly inside a window of
    /// `window_width` × `window_height`.
    ///
    /// ```
    /// # use annecy::{Frame, ON_SCREEN_PADDING};
    /// let frame = Frame::new(0.0, 100.0, 320.0, 80.0);
    /// assert!(frame.is_on_screen(320.0, 640.0, ON_SCREEN_PADDING));
    /// assert!(!frame.is_on_screen(320.0, 150.0, ON_SCREEN_PADDING));
    /// ```
    pub fn is_on_screen(&self, window_width: f64, window_height: f64, padding: f64) -> bool {
        let top = self.y + padding;
        let bottom = self.y + self.height - padding;
        let left = self.x + padding;
        let right = self.x + self.width - padding;

        top > 0.0 && bottom < window_height && left > 0.0 && right < window_width
    }
}
