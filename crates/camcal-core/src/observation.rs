use nalgebra::{Point2, Point3};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ObservationError {
    #[error("object/image point count mismatch (object={object}, image={image})")]
    LengthMismatch { object: usize, image: usize },
    #[error("observation has no points")]
    Empty,
}

/// Board points paired with their detected image positions for one view.
#[derive(Clone, Debug, PartialEq)]
pub struct Observation {
    object_points: Vec<Point3<f64>>,
    image_points: Vec<Point2<f32>>,
}

impl Observation {
    pub fn new(
        object_points: Vec<Point3<f64>>,
        image_points: Vec<Point2<f32>>,
    ) -> Result<Self, ObservationError> {
        if object_points.len() != image_points.len() {
            return Err(ObservationError::LengthMismatch {
                object: object_points.len(),
                image: image_points.len(),
            });
        }
        if object_points.is_empty() {
            return Err(ObservationError::Empty);
        }
        Ok(Self {
            object_points,
            image_points,
        })
    }

    pub fn object_points(&self) -> &[Point3<f64>] {
        &self.object_points
    }

    pub fn image_points(&self) -> &[Point2<f32>] {
        &self.image_points
    }

    pub fn len(&self) -> usize {
        self.object_points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.object_points.is_empty()
    }
}
