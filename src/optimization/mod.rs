pub mod homography;
pub mod ransac;

pub use homography::*;
pub use ransac::*;
