use std::f64::consts::PI;

use serde::Serialize;

use crate::error::{CalcError, CalcResult};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Triangle {
    pub perimeter: f64,
    pub area: f64,
    /// Angles in degrees, opposite sides a, b and c.
    pub angle_a: f64,
    pub angle_b: f64,
    pub angle_c: f64,
}

/// Solve a triangle from its three sides.
pub fn triangle(a: f64, b: f64, c: f64) -> CalcResult<Triangle> {
    if !(a > 0.0 && b > 0.0 && c > 0.0) {
        return Err(CalcError::invalid("Sides must be positive numbers."));
    }
    if a + b <= c || a + c <= b || b + c <= a {
        return Err(CalcError::invalid(
            "These side lengths cannot form a valid triangle.",
        ));
    }
    let perimeter = a + b + c;
    let s = perimeter / 2.0;
    let area = (s * (s - a) * (s - b) * (s - c)).sqrt();
    let angle_a = ((b * b + c * c - a * a) / (2.0 * b * c)).acos().to_degrees();
    let angle_b = ((a * a + c * c - b * b) / (2.0 * a * c)).acos().to_degrees();
    Ok(Triangle {
        perimeter,
        area,
        angle_a,
        angle_b,
        angle_c: 180.0 - angle_a - angle_b,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircleMeasure {
    Radius,
    Diameter,
    Circumference,
    Area,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Circle {
    pub radius: f64,
    pub diameter: f64,
    pub circumference: f64,
    pub area: f64,
}

/// Derive every circle measure from the one that is known.
pub fn circle(known: CircleMeasure, value: f64) -> CalcResult<Circle> {
    if !(value >= 0.0) || !value.is_finite() {
        return Err(CalcError::invalid("Please enter a non-negative number."));
    }
    let radius = match known {
        CircleMeasure::Radius => value,
        CircleMeasure::Diameter => value / 2.0,
        CircleMeasure::Circumference => value / (2.0 * PI),
        CircleMeasure::Area => (value / PI).sqrt(),
    };
    Ok(Circle {
        radius,
        diameter: 2.0 * radius,
        circumference: 2.0 * PI * radius,
        area: PI * radius * radius,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RightSide {
    A,
    B,
    C,
}

/// Solve `a² + b² = c²` for `solve_for`, using the other two values.
pub fn pythagorean(solve_for: RightSide, a: f64, b: f64, c: f64) -> CalcResult<f64> {
    match solve_for {
        RightSide::C => Ok((a * a + b * b).sqrt()),
        RightSide::A => {
            if c <= b {
                return Err(CalcError::invalid("c must be > b"));
            }
            Ok((c * c - b * b).sqrt())
        }
        RightSide::B => {
            if c <= a {
                return Err(CalcError::invalid("c must be > a"));
            }
            Ok((c * c - a * a).sqrt())
        }
    }
}

pub fn distance(p1: (f64, f64), p2: (f64, f64)) -> f64 {
    (p2.0 - p1.0).hypot(p2.1 - p1.1)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Shape {
    Rectangle { width: f64, height: f64 },
    Triangle { base: f64, height: f64 },
    Circle { radius: f64 },
}

pub fn area(shape: Shape) -> f64 {
    match shape {
        Shape::Rectangle { width, height } => width * height,
        Shape::Triangle { base, height } => 0.5 * base * height,
        Shape::Circle { radius } => PI * radius * radius,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64, eps: f64) -> bool {
        (a - b).abs() < eps
    }

    #[test]
    fn test_triangle_5_6_7() {
        let t = triangle(5.0, 6.0, 7.0).unwrap();
        assert_eq!(t.perimeter, 18.0);
        assert!(approx(t.area, 14.6969, 1e-4));
        assert!(approx(t.angle_a, 44.42, 1e-2));
        assert!(approx(t.angle_b, 57.12, 1e-2));
        assert!(approx(t.angle_a + t.angle_b + t.angle_c, 180.0, 1e-9));
    }

    #[test]
    fn test_triangle_inequality() {
        assert_eq!(
            triangle(1.0, 2.0, 3.0).unwrap_err().to_string(),
            "These side lengths cannot form a valid triangle."
        );
        assert!(triangle(0.0, 2.0, 3.0).is_err());
    }

    #[test]
    fn test_circle_from_any_measure() {
        let r = circle(CircleMeasure::Radius, 10.0).unwrap();
        assert!(approx(r.circumference, 62.83, 1e-2));
        assert!(approx(r.area, 314.16, 1e-2));
        let a = circle(CircleMeasure::Area, r.area).unwrap();
        assert!(approx(a.radius, 10.0, 1e-9));
        let c = circle(CircleMeasure::Circumference, r.circumference).unwrap();
        assert!(approx(c.diameter, 20.0, 1e-9));
        assert!(circle(CircleMeasure::Radius, -1.0).is_err());
    }

    #[test]
    fn test_pythagorean() {
        assert_eq!(pythagorean(RightSide::C, 3.0, 4.0, 0.0).unwrap(), 5.0);
        assert_eq!(pythagorean(RightSide::A, 0.0, 4.0, 5.0).unwrap(), 3.0);
        assert_eq!(pythagorean(RightSide::B, 3.0, 0.0, 5.0).unwrap(), 4.0);
        assert_eq!(
            pythagorean(RightSide::A, 0.0, 5.0, 4.0).unwrap_err().to_string(),
            "c must be > b"
        );
    }

    #[test]
    fn test_distance_and_area() {
        assert_eq!(distance((2.0, 3.0), (8.0, 11.0)), 10.0);
        assert_eq!(area(Shape::Rectangle { width: 10.0, height: 5.0 }), 50.0);
        assert_eq!(area(Shape::Triangle { base: 8.0, height: 5.0 }), 20.0);
        assert!(approx(area(Shape::Circle { radius: 7.0 }), 153.938, 1e-3));
    }
}
