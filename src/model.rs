use image::{DynamicImage, GenericImageView};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::catalog::Category;

/// Stretch factor at which an image counts as wide or tall.
const ASPECT_RATIO_CUTOFF: f64 = 1.5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Classification {
    pub label: Category,
    pub confidence: f64,
    pub secondary: Vec<Category>,
}

impl Classification {
    fn new(label: Category, confidence: f64, secondary: &[Category]) -> Self {
        Classification {
            label,
            confidence: confidence.clamp(0.0, 1.0),
            secondary: secondary.to_vec(),
        }
    }

    /// Result reported when the classifier itself breaks.
    pub fn fallback() -> Self {
        Classification::new(Category::Mixed, 0.5, &[])
    }
}

#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("image has no pixels ({width}x{height})")]
    EmptyImage { width: u32, height: u32 },
}

/// Anything that can turn a decoded image into a waste category.
///
/// Implementations never fail outward: internal problems are logged and
/// reported as [`Classification::fallback`].
pub trait Classifier: Send + Sync {
    fn predict(&self, image: &DynamicImage) -> Classification;
}

/// Placeholder model that only looks at the image's proportions.
#[derive(Debug, Default, Clone, Copy)]
pub struct AspectRatioClassifier;

impl AspectRatioClassifier {
    pub fn new() -> Self {
        AspectRatioClassifier
    }

    fn try_predict(&self, image: &DynamicImage) -> Result<Classification, ClassifierError> {
        let rgb = match image {
            DynamicImage::ImageRgb8(_) => None,
            other => Some(DynamicImage::ImageRgb8(other.to_rgb8())),
        };
        let image = rgb.as_ref().unwrap_or(image);

        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(ClassifierError::EmptyImage { width, height });
        }

        let (w, h) = (f64::from(width), f64::from(height));

        let classification = if w > h * ASPECT_RATIO_CUTOFF {
            Classification::new(Category::Plastic, 0.85, &[Category::Glass])
        } else if w * ASPECT_RATIO_CUTOFF < h {
            Classification::new(Category::Metal, 0.78, &[Category::Plastic])
        } else {
            Classification::new(
                Category::Paper,
                0.72,
                &[Category::Organic, Category::Mixed],
            )
        };

        Ok(classification)
    }
}

impl Classifier for AspectRatioClassifier {
    fn predict(&self, image: &DynamicImage) -> Classification {
        match self.try_predict(image) {
            Ok(classification) => classification,
            Err(err) => {
                error!("Prediction error: {}", err);
                Classification::fallback()
            }
        }
    }
}
