use nalgebra::Point3;
use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum BoardError {
    #[error("board needs at least 2 rows and 2 columns of squares (got rows={rows}, cols={cols})")]
    TooSmall { rows: u32, cols: u32 },
    #[error("square length must be positive and finite (got {0})")]
    InvalidSquareLength(f64),
}

/// Number of *inner* corners along each board direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternSize {
    pub inner_rows: u32,
    pub inner_cols: u32,
}

impl PatternSize {
    pub fn corner_count(&self) -> usize {
        self.inner_rows as usize * self.inner_cols as usize
    }
}

/// Printed checkerboard geometry.
///
/// `rows` and `cols` count squares, so the detectable grid has
/// `(rows - 1) x (cols - 1)` inner corners. `square_length` fixes the unit of
/// every translation the calibration produces.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoardSpec {
    pub rows: u32,
    pub cols: u32,
    pub square_length: f64,
}

impl Default for BoardSpec {
    fn default() -> Self {
        Self {
            rows: 9,
            cols: 7,
            square_length: 1.0,
        }
    }
}

impl BoardSpec {
    pub fn validate(&self) -> Result<(), BoardError> {
        if self.rows < 2 || self.cols < 2 {
            return Err(BoardError::TooSmall {
                rows: self.rows,
                cols: self.cols,
            });
        }
        if !self.square_length.is_finite() || self.square_length <= 0.0 {
            return Err(BoardError::InvalidSquareLength(self.square_length));
        }
        Ok(())
    }

    pub fn pattern_size(&self) -> PatternSize {
        PatternSize {
            inner_rows: self.rows.saturating_sub(1),
            inner_cols: self.cols.saturating_sub(1),
        }
    }

    /// Board-frame coordinates of every inner corner, at `z = 0`.
    ///
    /// The first coordinate runs fastest (`0..rows-1`), the second one
    /// slowest (`0..cols-1`), which is the order chessboard detectors report
    /// corners in. The sequence is the same for every view.
    pub fn object_points(&self) -> Vec<Point3<f64>> {
        let pattern = self.pattern_size();
        let mut out = Vec::with_capacity(pattern.corner_count());
        for j in 0..pattern.inner_cols {
            for i in 0..pattern.inner_rows {
                out.push(Point3::new(
                    i as f64 * self.square_length,
                    j as f64 * self.square_length,
                    0.0,
                ));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_board_has_48_points() {
        let board = BoardSpec {
            rows: 9,
            cols: 7,
            square_length: 1.0,
        };
        let pts = board.object_points();
        assert_eq!(pts.len(), 48);
        assert_eq!(pts.len(), board.pattern_size().corner_count());
        assert_eq!(pts[0], Point3::new(0.0, 0.0, 0.0));
        assert_eq!(pts[1], Point3::new(1.0, 0.0, 0.0));
        assert_eq!(pts[8], Point3::new(0.0, 1.0, 0.0));
        assert_eq!(pts[47], Point3::new(7.0, 5.0, 0.0));
        assert!(pts.iter().all(|p| p.z == 0.0));
    }

    #[test]
    fn object_points_scale_with_square_length() {
        let board = BoardSpec {
            rows: 4,
            cols: 3,
            square_length: 0.025,
        };
        let pts = board.object_points();
        assert_eq!(pts.len(), 6);
        let last = pts.last().copied().unwrap();
        assert!((last.x - 0.05).abs() < 1e-12);
        assert!((last.y - 0.025).abs() < 1e-12);
    }

    #[test]
    fn object_points_are_idempotent() {
        let board = BoardSpec::default();
        assert_eq!(board.object_points(), board.object_points());
    }

    #[test]
    fn rejects_degenerate_boards() {
        let thin = BoardSpec {
            rows: 1,
            cols: 7,
            square_length: 1.0,
        };
        assert_eq!(
            thin.validate(),
            Err(BoardError::TooSmall { rows: 1, cols: 7 })
        );

        let flat = BoardSpec {
            square_length: 0.0,
            ..BoardSpec::default()
        };
        assert_eq!(flat.validate(), Err(BoardError::InvalidSquareLength(0.0)));
        assert!(BoardSpec::default().validate().is_ok());
    }
}
