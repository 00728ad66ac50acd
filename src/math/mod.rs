/// 3D point type.
pub type Point3 = nalgebra::Point3<f64>;

/// 3D vector type.
pub type Vector3 = nalgebra::Vector3<f64>;

/// Arithmetic mean of a set of points, or `None` when the set is empty.
#[must_use]
pub fn barycenter<'a, I>(points: I) -> Option<Point3>
where
    I: IntoIterator<Item = &'a Point3>,
{
    let mut sum = Vector3::zeros();
    let mut count = 0_usize;
    for point in points {
        sum += point.coords;
        count += 1;
    }
    if count == 0 {
        return None;
    }
    #[allow(clippy::cast_precision_loss)]
    let inv = 1.0 / count as f64;
    Some(Point3::from(sum * inv))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn barycenter_of_triangle() {
        let points = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(3.0, 0.0, 0.0),
            Point3::new(0.0, 3.0, 3.0),
        ];
        let center = barycenter(&points);
        assert!(center.is_some());
        if let Some(center) = center {
            assert_relative_eq!(center, Point3::new(1.0, 1.0, 1.0));
        }
    }

    #[test]
    fn barycenter_of_nothing() {
        let none: [Point3; 0] = [];
        assert!(barycenter(&none).is_none());
    }
}
