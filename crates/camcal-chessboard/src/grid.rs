//! Lattice growth over ChESS candidates.
//!
//! A seed corner and two local step vectors are estimated from its nearest
//! neighbours; the lattice is then grown breadth-first by predicting each
//! neighbouring corner from the local steps and snapping to the nearest
//! unused candidate.

use crate::params::GridSearchParams;
use kiddo::{KdTree, SquaredEuclidean};
use nalgebra::{Point2, Vector2};
use std::collections::{HashMap, VecDeque};

/// Integer lattice assignment of candidate indices.
#[derive(Clone, Debug, Default)]
pub struct Lattice {
    nodes: HashMap<(i32, i32), usize>,
}

impl Lattice {
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, i: i32, j: i32) -> Option<usize> {
        self.nodes.get(&(i, j)).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = ((i32, i32), usize)> + '_ {
        self.nodes.iter().map(|(&k, &v)| (k, v))
    }

    /// `(min_i, max_i, min_j, max_j)`; `None` for an empty lattice.
    pub fn bounds(&self) -> Option<(i32, i32, i32, i32)> {
        let mut it = self.nodes.keys();
        let &(i0, j0) = it.next()?;
        let init = (i0, i0, j0, j0);
        Some(it.fold(init, |(a, b, c, d), &(i, j)| {
            (a.min(i), b.max(i), c.min(j), d.max(j))
        }))
    }

    /// Lattice extent `(width, height)` along the two lattice axes.
    pub fn extent(&self) -> Option<(usize, usize)> {
        let (min_i, max_i, min_j, max_j) = self.bounds()?;
        Some(((max_i - min_i + 1) as usize, (max_j - min_j + 1) as usize))
    }

    /// True when every node inside the bounding box is assigned.
    pub fn is_complete(&self) -> bool {
        match self.extent() {
            Some((w, h)) => w * h == self.len(),
            None => false,
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct GrowNode {
    index: usize,
    u: Vector2<f32>,
    v: Vector2<f32>,
}

/// Seeds ordered by distance to the candidate centroid.
fn seed_order(points: &[Point2<f32>]) -> Vec<usize> {
    let n = points.len() as f32;
    let (sx, sy) = points
        .iter()
        .fold((0.0f32, 0.0f32), |(sx, sy), p| (sx + p.x, sy + p.y));
    let centroid = Point2::new(sx / n, sy / n);

    let mut order: Vec<usize> = (0..points.len()).collect();
    order.sort_by(|&a, &b| {
        let da = (points[a] - centroid).norm_squared();
        let db = (points[b] - centroid).norm_squared();
        da.total_cmp(&db)
    });
    order
}

/// Estimate the two lattice step vectors at `seed`.
///
/// `u` is the nearest neighbour within the spacing limits; `v` is the closest
/// neighbour roughly orthogonal to `u` and of comparable length.
fn seed_axes(
    tree: &KdTree<f32, 2>,
    points: &[Point2<f32>],
    seed: usize,
    params: &GridSearchParams,
) -> Option<(Vector2<f32>, Vector2<f32>)> {
    let p = points[seed];
    let results = tree.nearest_n::<SquaredEuclidean>(&[p.x, p.y], params.seed_neighbors + 1);

    let steps: Vec<Vector2<f32>> = results
        .into_iter()
        .map(|nn| nn.item as usize)
        .filter(|&idx| idx != seed)
        .map(|idx| points[idx] - p)
        .filter(|d| {
            let len = d.norm();
            len >= params.min_spacing_pix && len <= params.max_spacing_pix
        })
        .collect();

    let u = *steps.first()?;
    let u_len = u.norm();
    let v = steps.iter().skip(1).copied().find(|d| {
        let len = d.norm();
        let cos = u.dot(d) / (u_len * len);
        cos.abs() < 0.5 && len < 2.0 * u_len && len > 0.5 * u_len
    })?;
    Some((u, v))
}

fn grow_from(
    tree: &KdTree<f32, 2>,
    points: &[Point2<f32>],
    seed: usize,
    (u, v): (Vector2<f32>, Vector2<f32>),
    params: &GridSearchParams,
) -> Lattice {
    let mut nodes: HashMap<(i32, i32), GrowNode> = HashMap::new();
    let mut used = vec![false; points.len()];
    let mut queue = VecDeque::new();

    nodes.insert((0, 0), GrowNode { index: seed, u, v });
    used[seed] = true;
    queue.push_back((0, 0));

    while let Some((i, j)) = queue.pop_front() {
        let node = nodes[&(i, j)];
        let p = points[node.index];

        for (di, dj) in [(1, 0), (-1, 0), (0, 1), (0, -1)] {
            let key = (i + di, j + dj);
            if nodes.contains_key(&key) {
                continue;
            }

            let step = node.u * di as f32 + node.v * dj as f32;
            let predicted = p + step;
            let radius = params.search_radius_rel * step.norm();

            let nn = tree.nearest_one::<SquaredEuclidean>(&[predicted.x, predicted.y]);
            if nn.distance > radius * radius {
                continue;
            }
            let index = nn.item as usize;
            if used[index] {
                continue;
            }

            let actual = points[index] - p;
            let (nu, nv) = if di != 0 {
                (actual * di as f32, node.v)
            } else {
                (node.u, actual * dj as f32)
            };

            used[index] = true;
            nodes.insert(
                key,
                GrowNode {
                    index,
                    u: nu,
                    v: nv,
                },
            );
            queue.push_back(key);
        }
    }

    Lattice {
        nodes: nodes.into_iter().map(|(k, n)| (k, n.index)).collect(),
    }
}

/// Grow lattices from up to `max_seeds` seeds and return the first complete
/// one whose extent is `expected` in either orientation.
pub fn find_lattice(
    points: &[Point2<f32>],
    expected: (usize, usize),
    params: &GridSearchParams,
) -> Option<Lattice> {
    let (ew, eh) = expected;
    if points.len() < ew * eh {
        return None;
    }

    let coords: Vec<[f32; 2]> = points.iter().map(|p| [p.x, p.y]).collect();
    let tree: KdTree<f32, 2> = (&coords).into();

    for seed in seed_order(points).into_iter().take(params.max_seeds) {
        let Some(axes) = seed_axes(&tree, points, seed, params) else {
            continue;
        };
        let lattice = grow_from(&tree, points, seed, axes, params);
        let extent = lattice.extent();
        log::trace!(
            "seed {seed}: grew {} nodes, extent {:?}",
            lattice.len(),
            extent
        );

        let matches = matches!(extent, Some((w, h)) if (w, h) == (ew, eh) || (w, h) == (eh, ew));
        if matches && lattice.is_complete() {
            return Some(lattice);
        }
    }
    None
}
