pub mod aggregate;
pub mod cache;
pub mod clock;
pub mod locator;
pub mod reader;
pub mod window;

pub use cache::WindowCache;
pub use clock::Clock;
pub use window::TimeWindow;
