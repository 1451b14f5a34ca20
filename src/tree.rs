use super::config::BoxGeometry;
use super::constants::TREE_MAX_DEPTH;
use super::particles::{Axes, Particle};

/// Octree over the particles of the simulation box (Barnes & Hut, 1986).
///
/// Cells live in an arena and refer to each other by index. Every root box of
/// the simulation gets its own root cell. The tree is rebuilt from scratch every
/// time it is needed; cell indices (and `Particle::cell`) are only meaningful
/// until the next rebuild.
///
/// A particle that lies exactly on a splitting plane goes to the upper half on
/// that axis (coordinates `>=` the cell center are "upper").
pub type CellId = usize;

#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct Quadrupole {
    pub xx: f64,
    pub xy: f64,
    pub xz: f64,
    pub yy: f64,
    pub yz: f64,
    pub zz: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CellContent {
    Leaf(usize),
    Bucket(Vec<usize>), // Coincident particles that could not be separated
    Children([Option<CellId>; 8]),
}

#[derive(Debug, Clone)]
pub struct TreeCell {
    pub center: Axes,
    pub width: f64,
    pub mass: f64,
    pub center_of_mass: Axes,
    pub quadrupole: Quadrupole,
    pub enclosing_radius: f64, // Sphere around `center` holding every contained particle
    pub content: CellContent,
}

#[derive(Debug, Clone, Default)]
pub struct Tree {
    cells: Vec<TreeCell>,
    roots: Vec<Option<CellId>>,
    geometry: BoxGeometry,
    max_radius: [f64; 2], // Largest and second largest particle radius
}

/// Octant of `position` inside a cell centered at `center`: a set bit means the
/// lower half on that axis (x: 1, y: 2, z: 4).
pub fn octant(center: &Axes, position: &Axes) -> usize {
    let mut octant = 0;
    if position.x < center.x {
        octant += 1;
    }
    if position.y < center.y {
        octant += 2;
    }
    if position.z < center.z {
        octant += 4;
    }
    octant
}

fn child_center(center: &Axes, width: f64, octant: usize) -> Axes {
    let quarter = width/4.;
    Axes {
        x: center.x + if octant & 1 != 0 { -quarter } else { quarter },
        y: center.y + if octant & 2 != 0 { -quarter } else { quarter },
        z: center.z + if octant & 4 != 0 { -quarter } else { quarter },
    }
}

impl Tree {
    /// Build the tree from the first `n_real` particles. Only the first
    /// `n_active` particles contribute mass to the cell summaries.
    pub fn build(geometry: &BoxGeometry, particles: &mut [Particle], n_real: usize, n_active: usize) -> Tree {
        let mut tree = Tree {
            cells: Vec::with_capacity(2*n_real),
            roots: vec![None; geometry.root_n()],
            geometry: *geometry,
            max_radius: [0., 0.],
        };
        for particle in particles.iter_mut() {
            particle.cell = None;
        }
        for index in 0..n_real {
            let radius = particles[index].radius;
            if radius > tree.max_radius[0] {
                tree.max_radius[1] = tree.max_radius[0];
                tree.max_radius[0] = radius;
            } else if radius > tree.max_radius[1] {
                tree.max_radius[1] = radius;
            }
            if !particles[index].position.is_finite() {
                continue;
            }
            tree.insert(index, particles);
        }
        tree.update_summaries(particles, n_active);
        tree
    }

    pub fn cells(&self) -> &[TreeCell] {
        &self.cells
    }

    pub fn cell(&self, id: CellId) -> &TreeCell {
        &self.cells[id]
    }

    pub fn roots(&self) -> &[Option<CellId>] {
        &self.roots
    }

    pub fn max_radius(&self) -> [f64; 2] {
        self.max_radius
    }

    /// Largest radius a collision partner of a particle with `radius` may have
    pub fn largest_partner_radius(&self, radius: f64) -> f64 {
        if radius >= self.max_radius[0] {
            self.max_radius[1]
        } else {
            self.max_radius[0]
        }
    }

    fn root_index(&self, position: &Axes) -> usize {
        let boxsize = self.geometry.boxsize();
        let root_size = self.geometry.root_size;
        let clamp = |value: f64, n: usize| -> usize {
            let index = value.floor();
            if index < 0. {
                0
            } else if index >= n as f64 {
                n - 1
            } else {
                index as usize
            }
        };
        let ix = clamp((position.x + boxsize.x/2.)/root_size, self.geometry.root_nx);
        let iy = clamp((position.y + boxsize.y/2.)/root_size, self.geometry.root_ny);
        let iz = clamp((position.z + boxsize.z/2.)/root_size, self.geometry.root_nz);
        (iz*self.geometry.root_ny + iy)*self.geometry.root_nx + ix
    }

    fn root_center(&self, root: usize) -> Axes {
        let boxsize = self.geometry.boxsize();
        let root_size = self.geometry.root_size;
        let ix = root % self.geometry.root_nx;
        let iy = (root / self.geometry.root_nx) % self.geometry.root_ny;
        let iz = root / (self.geometry.root_nx*self.geometry.root_ny);
        Axes {
            x: -boxsize.x/2. + root_size*(0.5 + ix as f64),
            y: -boxsize.y/2. + root_size*(0.5 + iy as f64),
            z: -boxsize.z/2. + root_size*(0.5 + iz as f64),
        }
    }

    fn new_leaf(&mut self, center: Axes, width: f64, index: usize, particles: &mut [Particle]) -> CellId {
        let id = self.cells.len();
        self.cells.push(TreeCell {
            center: center,
            width: width,
            mass: 0.,
            center_of_mass: center,
            quadrupole: Quadrupole::default(),
            enclosing_radius: 0.,
            content: CellContent::Leaf(index),
        });
        particles[index].cell = Some(id);
        id
    }

    fn insert(&mut self, index: usize, particles: &mut [Particle]) {
        let position = particles[index].position;
        let root = self.root_index(&position);
        let mut cell_id = match self.roots[root] {
            Some(cell_id) => cell_id,
            None => {
                let center = self.root_center(root);
                let root_size = self.geometry.root_size;
                let cell_id = self.new_leaf(center, root_size, index, particles);
                self.roots[root] = Some(cell_id);
                return;
            },
        };
        let mut depth = 0;
        loop {
            let center = self.cells[cell_id].center;
            let width = self.cells[cell_id].width;
            match self.cells[cell_id].content {
                CellContent::Children(children) => {
                    let o = octant(&center, &position);
                    match children[o] {
                        Some(child) => {
                            cell_id = child;
                            depth += 1;
                        },
                        None => {
                            let child = self.new_leaf(child_center(&center, width, o), width/2., index, particles);
                            if let CellContent::Children(ref mut children) = self.cells[cell_id].content {
                                children[o] = Some(child);
                            }
                            return;
                        },
                    }
                },
                CellContent::Leaf(existing) => {
                    if depth >= TREE_MAX_DEPTH {
                        self.cells[cell_id].content = CellContent::Bucket(vec![existing, index]);
                        particles[index].cell = Some(cell_id);
                        return;
                    }
                    // Split the leaf and push the resident particle one level down,
                    // the new particle is placed on the next iteration
                    let o = octant(&center, &particles[existing].position);
                    let child = self.new_leaf(child_center(&center, width, o), width/2., existing, particles);
                    let mut children = [None; 8];
                    children[o] = Some(child);
                    self.cells[cell_id].content = CellContent::Children(children);
                },
                CellContent::Bucket(ref mut members) => {
                    members.push(index);
                    particles[index].cell = Some(cell_id);
                    return;
                },
            }
        }
    }

    /// Mass, center of mass, quadrupole (Hernquist, 1987) and enclosing radius of
    /// every cell. Children always have larger ids than their parent, so a reverse
    /// sweep over the arena visits them first.
    fn update_summaries(&mut self, particles: &[Particle], n_active: usize) {
        let active_mass = |index: usize| -> f64 {
            if index < n_active { particles[index].mass } else { 0. }
        };
        for id in (0..self.cells.len()).rev() {
            let center = self.cells[id].center;
            let mut mass = 0.;
            let mut weighted = Axes::zero();
            let mut enclosing_radius: f64 = 0.;
            let mut quadrupole = Quadrupole::default();
            // (mass, center of mass, quadrupole, enclosing radius) of each component
            let components: Vec<(f64, Axes, Quadrupole, f64)> = match self.cells[id].content {
                CellContent::Leaf(index) => {
                    let position = particles[index].position;
                    vec![(active_mass(index), position, Quadrupole::default(), 0.)]
                },
                CellContent::Bucket(ref members) => {
                    members.iter().map(|&index| (active_mass(index), particles[index].position, Quadrupole::default(), 0.)).collect()
                },
                CellContent::Children(children) => {
                    children.iter().filter_map(|child| *child).map(|child| {
                        let cell = &self.cells[child];
                        (cell.mass, cell.center_of_mass, cell.quadrupole, (cell.center - center).norm() + cell.enclosing_radius)
                    }).collect()
                },
            };
            for &(component_mass, component_com, _, component_radius) in components.iter() {
                mass += component_mass;
                weighted += component_com * component_mass;
                let distance = if let CellContent::Children(_) = self.cells[id].content {
                    component_radius
                } else {
                    (component_com - center).norm()
                };
                enclosing_radius = enclosing_radius.max(distance);
            }
            let center_of_mass = if mass > 0. {
                weighted * (1./mass)
            } else {
                // Massless cells keep the geometric mean of their content
                let n = components.len() as f64;
                components.iter().fold(Axes::zero(), |sum, component| sum + component.1) * (1./n)
            };
            if components.len() > 1 {
                for &(component_mass, component_com, component_quadrupole, _) in components.iter() {
                    let q = component_com - center_of_mass;
                    let qr2 = q.norm2();
                    quadrupole.xx += component_quadrupole.xx + component_mass*(3.*q.x*q.x - qr2);
                    quadrupole.xy += component_quadrupole.xy + component_mass*3.*q.x*q.y;
                    quadrupole.xz += component_quadrupole.xz + component_mass*3.*q.x*q.z;
                    quadrupole.yy += component_quadrupole.yy + component_mass*(3.*q.y*q.y - qr2);
                    quadrupole.yz += component_quadrupole.yz + component_mass*3.*q.y*q.z;
                }
                quadrupole.zz = -quadrupole.xx - quadrupole.yy;
            }
            let cell = &mut self.cells[id];
            cell.mass = mass;
            cell.center_of_mass = center_of_mass;
            cell.quadrupole = quadrupole;
            cell.enclosing_radius = enclosing_radius.max(0.8660254037844386*cell.width);
        }
    }

    /// Gravitational acceleration at `query` (a particle position shifted by a
    /// ghost box) from every cell, opening cells while
    /// `width^2 >= opening_angle2 * distance^2` or while the query point lies
    /// inside them. Sources listed in `skipped` do not contribute: a cell whose
    /// enclosing sphere holds one of them is always opened.
    #[allow(non_snake_case)]
    pub fn acceleration_at(&self, query: &Axes, skipped: &[usize], particles: &[Particle], n_active: usize,
                           G: f64, softening2: f64, opening_angle2: f64, quadrupole: bool) -> Axes {
        let mut acceleration = Axes::zero();
        let mut stack: Vec<CellId> = self.roots.iter().filter_map(|root| *root).collect();
        while let Some(id) = stack.pop() {
            let cell = &self.cells[id];
            match cell.content {
                CellContent::Leaf(index) => {
                    if index < n_active && !skipped.contains(&index) {
                        acceleration += pairwise(query, &particles[index].position, particles[index].mass, G, softening2);
                    }
                },
                CellContent::Bucket(ref members) => {
                    for &index in members.iter() {
                        if index < n_active && !skipped.contains(&index) {
                            acceleration += pairwise(query, &particles[index].position, particles[index].mass, G, softening2);
                        }
                    }
                },
                CellContent::Children(children) => {
                    if cell.mass == 0. {
                        continue;
                    }
                    let d = *query - cell.center_of_mass;
                    let r2 = d.norm2();
                    let radius2 = cell.enclosing_radius*cell.enclosing_radius;
                    let inside = (*query - cell.center).norm2() <= radius2;
                    let holds_skipped = skipped.iter().any(|&index| (particles[index].position - cell.center).norm2() <= radius2);
                    if inside || holds_skipped || cell.width*cell.width >= opening_angle2*r2 {
                        stack.extend(children.iter().filter_map(|child| *child));
                    } else {
                        let r = (r2 + softening2).sqrt();
                        let prefact = -G/(r*r*r)*cell.mass;
                        if quadrupole {
                            let q = &cell.quadrupole;
                            let mut qprefact = G/(r*r*r*r*r);
                            acceleration.x += qprefact*(d.x*q.xx + d.y*q.xy + d.z*q.xz);
                            acceleration.y += qprefact*(d.x*q.xy + d.y*q.yy + d.z*q.yz);
                            acceleration.z += qprefact*(d.x*q.xz + d.y*q.yz + d.z*q.zz);
                            let mrr = d.x*d.x*q.xx + d.y*d.y*q.yy + d.z*d.z*q.zz
                                    + 2.*d.x*d.y*q.xy + 2.*d.x*d.z*q.xz + 2.*d.y*d.z*q.yz;
                            qprefact *= -5.0/(2.0*r*r)*mrr;
                            acceleration += d * (qprefact + prefact);
                        } else {
                            acceleration += d * prefact;
                        }
                    }
                },
            }
        }
        acceleration
    }

    /// Call `visitor` with every particle stored in a cell whose enclosing sphere
    /// comes within `search_radius` of `query`.
    pub fn visit_neighbour_candidates<F: FnMut(usize)>(&self, query: &Axes, search_radius: f64, mut visitor: F) {
        let mut stack: Vec<CellId> = self.roots.iter().filter_map(|root| *root).collect();
        while let Some(id) = stack.pop() {
            let cell = &self.cells[id];
            let reach = search_radius + cell.enclosing_radius;
            if (*query - cell.center).norm2() > reach*reach {
                continue;
            }
            match cell.content {
                CellContent::Leaf(index) => visitor(index),
                CellContent::Bucket(ref members) => {
                    for &index in members.iter() {
                        visitor(index);
                    }
                },
                CellContent::Children(children) => stack.extend(children.iter().filter_map(|child| *child)),
            }
        }
    }

    /// Particle indices held by leaves and buckets, in arena order
    pub fn leaf_particles(&self) -> Vec<usize> {
        let mut indices = Vec::new();
        for cell in self.cells.iter() {
            match cell.content {
                CellContent::Leaf(index) => indices.push(index),
                CellContent::Bucket(ref members) => indices.extend(members.iter().cloned()),
                CellContent::Children(_) => {},
            }
        }
        indices
    }
}

#[allow(non_snake_case)]
fn pairwise(query: &Axes, source: &Axes, mass: f64, G: f64, softening2: f64) -> Axes {
    let d = *query - *source;
    let r = (d.norm2() + softening2).sqrt();
    d * (-G/(r*r*r)*mass)
}
