//! Line geometry for viewport helpers: joint limit arcs and wire shapes for bones and shapes.
//!
//! Nothing here draws. Each function returns the batches a renderer has to submit, in order.

use glam::{Mat4, Vec2, Vec3, Vec4};
use std::f32::consts::TAU;

/// Segments of a joint limit circle.
pub const LIMIT_SEGMENTS: u32 = 24;

const LIMIT_WIDTH: f32 = 2.0;
const ROTATION_POINT_SIZE: f32 = 6.0;
const GREY: Vec4 = Vec4::new(0.5, 0.5, 0.5, 0.8);
const YELLOW: Vec4 = Vec4::new(1.0, 1.0, 0.0, 1.0);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Primitive {
    Lines,
    LineLoop,
    LineStrip,
    Points,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DrawBatch {
    pub primitive: Primitive,
    pub width: f32,
    pub point_size: f32,
    pub vertices: Vec<Vec3>,
    /// One colour per vertex, or empty to draw with the renderer's current colour.
    pub colors: Vec<Vec4>,
}

impl DrawBatch {
    fn new(primitive: Primitive, vertices: Vec<Vec3>) -> Self {
        DrawBatch {
            primitive,
            width: 1.0,
            point_size: 1.0,
            vertices,
            colors: Vec::new(),
        }
    }
}

/// Points along an arc from `start` to `end` radians. The end point is only included with
/// `close`.
pub fn gen_arc(radius: f32, start: f32, end: f32, segments: u32, close: bool) -> Vec<Vec2> {
    if segments == 0 {
        return Vec::new();
    }

    let theta = (end - start) / segments as f32;
    let count = if close { segments + 1 } else { segments };
    (0..count)
        .map(|i| {
            let angle = start + theta * i as f32;
            Vec2::new(angle.cos(), angle.sin()) * radius
        })
        .collect()
}

pub fn gen_circle(radius: f32, segments: u32) -> Vec<Vec2> {
    gen_arc(radius, 0.0, TAU, segments, false)
}

/// A closed arc whose segment count is proportional to its share of a full turn.
fn varying_arc(radius: f32, start: f32, end: f32, full_segments: u32) -> Vec<Vec2> {
    let segments = (full_segments as f32 * (end - start).abs() / TAU).ceil() as u32;
    gen_arc(radius, start, end, segments, true)
}

/// A rotation limit circle: the allowed range in `color`, the rest in grey and a yellow point at
/// the current rotation. `plane` maps circle points into 3D.
pub fn limit_circle<F>(
    rotate: f32,
    radius: f32,
    segments: u32,
    color: Vec4,
    min_limit: f32,
    max_limit: f32,
    plane: F,
) -> Vec<DrawBatch>
where
    F: Fn(Vec2) -> Vec3,
{
    let allowed = varying_arc(radius, min_limit, max_limit, segments);
    let rest = varying_arc(radius, max_limit, TAU + min_limit, segments);

    let mut arc = DrawBatch::new(Primitive::LineStrip, Vec::new());
    arc.width = LIMIT_WIDTH;
    for (points, color) in [(allowed, color), (rest, GREY)] {
        arc.colors.extend(std::iter::repeat(color).take(points.len()));
        arc.vertices.extend(points.into_iter().map(&plane));
    }

    let mut point = DrawBatch::new(
        Primitive::Points,
        gen_arc(radius, rotate, rotate + 1.0, 1, false).into_iter().map(&plane).collect(),
    );
    point.point_size = ROTATION_POINT_SIZE;
    point.colors = vec![YELLOW; point.vertices.len()];

    vec![arc, point]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub fn color(self) -> Vec4 {
        match self {
            Axis::X => Vec4::new(1.0, 0.0, 0.0, 1.0),
            Axis::Y => Vec4::new(0.0, 1.0, 0.0, 1.0),
            Axis::Z => Vec4::new(0.0, 0.0, 1.0, 1.0),
        }
    }

    /// Maps a point of the limit circle into the plane perpendicular to the axis.
    pub fn plane_point(self, p: Vec2) -> Vec3 {
        match self {
            Axis::X => Vec3::new(0.0, -p.x, p.y),
            Axis::Y => Vec3::new(-p.y, 0.0, p.x),
            Axis::Z => Vec3::new(-p.x, -p.y, 0.0),
        }
    }
}

pub fn joint_limits(rotate: f32, min_limit: f32, max_limit: f32, axis: Axis, radius: f32) -> Vec<DrawBatch> {
    limit_circle(
        rotate,
        radius,
        LIMIT_SEGMENTS,
        axis.color(),
        min_limit,
        max_limit,
        |p| axis.plane_point(p),
    )
}

pub fn wire_cube(half: Vec3) -> Vec<DrawBatch> {
    let corner = |x: f32, y: f32, z: f32| Vec3::new(x * half.x, y * half.y, z * half.z);
    let face = |z: f32| vec![corner(-1.0, -1.0, z), corner(1.0, -1.0, z), corner(1.0, 1.0, z), corner(-1.0, 1.0, z)];

    let edges = [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)]
        .iter()
        .flat_map(|&(x, y)| vec![corner(x, y, -1.0), corner(x, y, 1.0)])
        .collect();

    vec![
        DrawBatch::new(Primitive::LineLoop, face(-1.0)),
        DrawBatch::new(Primitive::LineLoop, face(1.0)),
        DrawBatch::new(Primitive::Lines, edges),
    ]
}

pub fn wire_sphere(radius: f32, segments: u32) -> Vec<DrawBatch> {
    let circle = gen_circle(radius, segments);
    let ring = |f: fn(Vec2) -> Vec3| DrawBatch::new(Primitive::LineLoop, circle.iter().copied().map(f).collect());

    vec![
        ring(|p| Vec3::new(p.x, p.y, 0.0)),
        ring(|p| Vec3::new(0.0, p.x, p.y)),
        ring(|p| Vec3::new(p.y, 0.0, p.x)),
    ]
}

pub fn wire_cylinder(radius: f32, half_height: f32, segments: u32) -> Vec<DrawBatch> {
    let circle = gen_circle(radius, segments);
    let ring = |y: f32| {
        DrawBatch::new(
            Primitive::LineLoop,
            circle.iter().map(|p| Vec3::new(p.x, y, p.y)).collect(),
        )
    };

    let sides = [
        Vec3::new(-radius, 0.0, 0.0),
        Vec3::new(radius, 0.0, 0.0),
        Vec3::new(0.0, 0.0, -radius),
        Vec3::new(0.0, 0.0, radius),
    ]
    .iter()
    .flat_map(|&p| vec![p - Vec3::Y * half_height, p + Vec3::Y * half_height])
    .collect();

    vec![ring(-half_height), ring(half_height), DrawBatch::new(Primitive::Lines, sides)]
}

pub fn cross(size: f32) -> DrawBatch {
    let vertices = [Vec3::X, Vec3::Y, Vec3::Z]
        .iter()
        .flat_map(|&axis| vec![-axis * size, axis * size])
        .collect();
    DrawBatch::new(Primitive::Lines, vertices)
}

/// The 16 floats of `matrix`, row after row.
pub fn matrix_to_buffer(matrix: &Mat4) -> [f32; 16] {
    matrix.transpose().to_cols_array()
}
