//! Grid assembly: turn a cloud of X-junction peaks into an ordered board.
//!
//! Starting from a seed corner and its two nearest roughly orthogonal
//! neighbours, the grid grows breadth-first. Each accepted corner predicts
//! its four neighbours with its own local axis vectors, so the search
//! follows perspective distortion across the board.

use super::chess::Peak;
use camcal_core::PatternSize;
use log::debug;
use nalgebra::{Point2, Vector2};
use std::collections::{HashMap, HashSet, VecDeque};

/// Tuning for [`assemble_grid`].
#[derive(Clone, Copy, Debug)]
pub(crate) struct GridParams {
    /// Search radius around a predicted corner, relative to the step length.
    pub tolerance: f32,
    /// Seeds tried before giving up.
    pub max_seeds: usize,
}

#[derive(Clone, Copy, Debug)]
struct Node {
    peak: usize,
    u: Vector2<f32>,
    v: Vector2<f32>,
}

struct Grown {
    nodes: HashMap<(i32, i32), Node>,
    u: Vector2<f32>,
    v: Vector2<f32>,
}

fn nearest_unused(
    peaks: &[Peak],
    used: &[bool],
    target: Point2<f32>,
    radius: f32,
) -> Option<usize> {
    peaks
        .iter()
        .enumerate()
        .filter(|(i, _)| !used[*i])
        .map(|(i, p)| (i, (p.position - target).norm()))
        .filter(|&(_, d)| d <= radius)
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(i, _)| i)
}

/// Local axes at `seed`: the nearest neighbour, and the nearest one roughly
/// orthogonal to it with a comparable spacing.
fn seed_axes(peaks: &[Peak], seed: usize) -> Option<(Vector2<f32>, Vector2<f32>)> {
    let origin = peaks[seed].position;
    let mut near: Vec<(f32, Vector2<f32>)> = peaks
        .iter()
        .enumerate()
        .filter(|&(i, _)| i != seed)
        .map(|(_, p)| {
            let d = p.position - origin;
            (d.norm(), d)
        })
        .filter(|(len, _)| *len > 1.0)
        .collect();
    near.sort_by(|a, b| a.0.total_cmp(&b.0));
    near.truncate(8);

    let (u_len, u) = *near.first()?;
    let (_, v) = near.iter().skip(1).find(|(len, d)| {
        let ratio = len / u_len;
        let cos = (u.dot(d) / (u_len * len)).abs();
        (0.5..=2.0).contains(&ratio) && cos < 0.5
    })?;
    Some((u, *v))
}

fn grow(peaks: &[Peak], seed: usize, params: &GridParams, limit: usize) -> Option<Grown> {
    let (u, v) = seed_axes(peaks, seed)?;
    let mut used = vec![false; peaks.len()];
    used[seed] = true;

    let mut nodes = HashMap::new();
    nodes.insert((0, 0), Node { peak: seed, u, v });
    let mut queue = VecDeque::from([(0i32, 0i32)]);

    while let Some((a, b)) = queue.pop_front() {
        let node = nodes[&(a, b)];
        let origin = peaks[node.peak].position;
        for (da, db) in [(1, 0), (-1, 0), (0, 1), (0, -1)] {
            let key = (a + da, b + db);
            if nodes.contains_key(&key) {
                continue;
            }
            let step = node.u * da as f32 + node.v * db as f32;
            let radius = params.tolerance * step.norm();
            let Some(found) = nearest_unused(peaks, &used, origin + step, radius) else {
                continue;
            };
            let delta = peaks[found].position - origin;
            let (nu, nv) = if da != 0 {
                (delta * da as f32, node.v)
            } else {
                (node.u, delta * db as f32)
            };
            used[found] = true;
            nodes.insert(
                key,
                Node {
                    peak: found,
                    u: nu,
                    v: nv,
                },
            );
            if nodes.len() > limit {
                return None;
            }
            queue.push_back(key);
        }
    }
    Some(Grown { nodes, u, v })
}

/// Which grid axis feeds the template's fast index, and in which direction.
#[derive(Clone, Copy, Debug)]
struct Orientation {
    swap: bool,
    sign_i: i32,
    sign_j: i32,
}

/// Pick the labelling whose first axis points rightmost while the board's
/// normal faces away from the camera (`i x j > 0` in image coordinates).
fn orient(dims: (u32, u32), pattern: PatternSize, u: Vector2<f32>, v: Vector2<f32>) -> Option<Orientation> {
    let (r, c) = (pattern.inner_rows, pattern.inner_cols);
    let mut best: Option<(f32, Orientation)> = None;
    for swap in [false, true] {
        let fits = if swap { dims == (c, r) } else { dims == (r, c) };
        if !fits {
            continue;
        }
        let (axis_i, axis_j) = if swap { (v, u) } else { (u, v) };
        for sign_i in [1, -1] {
            for sign_j in [1, -1] {
                let di = axis_i * sign_i as f32;
                let dj = axis_j * sign_j as f32;
                if di.x * dj.y - di.y * dj.x <= 0.0 {
                    continue;
                }
                let score = di.x / di.norm().max(f32::EPSILON);
                if best.map_or(true, |(s, _)| score > s) {
                    best = Some((
                        score,
                        Orientation {
                            swap,
                            sign_i,
                            sign_j,
                        },
                    ));
                }
            }
        }
    }
    best.map(|(_, o)| o)
}

fn order(grown: &Grown, peaks: &[Peak], pattern: PatternSize) -> Option<Vec<Point2<f32>>> {
    let n = pattern.corner_count();
    if grown.nodes.len() != n {
        return None;
    }
    let (mut amin, mut amax, mut bmin, mut bmax) = (i32::MAX, i32::MIN, i32::MAX, i32::MIN);
    for &(a, b) in grown.nodes.keys() {
        amin = amin.min(a);
        amax = amax.max(a);
        bmin = bmin.min(b);
        bmax = bmax.max(b);
    }
    let dims = ((amax - amin + 1) as u32, (bmax - bmin + 1) as u32);
    let o = orient(dims, pattern, grown.u, grown.v)?;

    let along = |k: u32, sign: i32, lo: i32, hi: i32| if sign > 0 { lo + k as i32 } else { hi - k as i32 };
    let mut out = Vec::with_capacity(n);
    for j in 0..pattern.inner_cols {
        for i in 0..pattern.inner_rows {
            let key = if o.swap {
                (along(j, o.sign_j, amin, amax), along(i, o.sign_i, bmin, bmax))
            } else {
                (along(i, o.sign_i, amin, amax), along(j, o.sign_j, bmin, bmax))
            };
            out.push(peaks[grown.nodes.get(&key)?.peak].position);
        }
    }
    Some(out)
}

/// Find a complete `pattern` grid among `peaks` (strongest first) and return
/// its corners in template order, or `None` if no seed grows into one.
pub(crate) fn assemble_grid(peaks: &[Peak], pattern: PatternSize, params: &GridParams) -> Option<Vec<Point2<f32>>> {
    let n = pattern.corner_count();
    if n == 0 || peaks.len() < n {
        return None;
    }
    let limit = 2 * n;
    let mut tried = HashSet::new();
    for seed in 0..peaks.len().min(params.max_seeds.max(1) * 4) {
        if tried.len() >= params.max_seeds.max(1) {
            break;
        }
        if tried.contains(&seed) {
            continue;
        }
        let Some(grown) = grow(peaks, seed, params, limit) else {
            tried.insert(seed);
            continue;
        };
        if let Some(corners) = order(&grown, peaks, pattern) {
            return Some(corners);
        }
        debug!(
            "seed {seed} grew a {}-corner grid, expected {n}",
            grown.nodes.len()
        );
        tried.insert(seed);
        tried.extend(grown.nodes.values().map(|node| node.peak));
    }
    None
}
