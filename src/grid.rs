//! The grid service consumed by validation and dense-array conversion.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::datatype::CellId;

pub trait ModelGrid: fmt::Debug + Send + Sync {
    /// False while the grid is still being defined; nothing is validated against it then.
    fn is_complete(&self) -> bool;
    /// Extent of every axis a cellid addresses.
    fn axis_bounds(&self) -> Vec<usize>;
    /// True if the cell exists and is part of the active domain.
    fn active_flag(&self, cellid: &CellId) -> bool;
    fn num_spatial_coordinates(&self) -> usize {
        self.axis_bounds().len()
    }
    /// Freeze geometry while many rows are formatted.
    fn lock(&self);
    fn unlock(&self);
}

// ------------- GridLock -------------
/// Holds a grid locked for as long as it lives, including on early error returns.
pub struct GridLock<'g> {
    grid: Option<&'g dyn ModelGrid>,
}
impl<'g> GridLock<'g> {
    pub fn acquire(grid: Option<&'g dyn ModelGrid>) -> Self {
        if let Some(grid) = grid {
            grid.lock();
        }
        Self { grid }
    }
}
impl Drop for GridLock<'_> {
    fn drop(&mut self) {
        if let Some(grid) = self.grid {
            grid.unlock();
        }
    }
}

// ------------- StructuredGrid -------------
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridKind {
    /// layers, rows and columns
    Structured,
    /// layers and cells per layer
    Vertex,
    /// nodes
    Unstructured,
}

#[derive(Debug)]
pub struct StructuredGrid {
    kind: GridKind,
    shape: Vec<usize>,
    idomain: Option<Vec<i32>>,
    complete: bool,
    locks: AtomicUsize,
}

impl StructuredGrid {
    fn with_shape(kind: GridKind, shape: Vec<usize>) -> Self {
        Self {
            kind,
            shape,
            idomain: None,
            complete: true,
            locks: AtomicUsize::new(0),
        }
    }
    pub fn dis(nlay: usize, nrow: usize, ncol: usize) -> Self {
        Self::with_shape(GridKind::Structured, vec![nlay, nrow, ncol])
    }
    pub fn disv(nlay: usize, ncpl: usize) -> Self {
        Self::with_shape(GridKind::Vertex, vec![nlay, ncpl])
    }
    pub fn disu(nodes: usize) -> Self {
        Self::with_shape(GridKind::Unstructured, vec![nodes])
    }
    /// Active domain in row-major order; a cell is active when its value is 1 or more.
    /// Ignored unless it has exactly one entry per cell.
    pub fn with_idomain(mut self, idomain: Vec<i32>) -> Self {
        if idomain.len() == self.cell_count() {
            self.idomain = Some(idomain);
        }
        self
    }
    pub fn incomplete(mut self) -> Self {
        self.complete = false;
        self
    }
    pub fn kind(&self) -> GridKind {
        self.kind
    }
    pub fn cell_count(&self) -> usize {
        self.shape.iter().product()
    }
    pub fn is_locked(&self) -> bool {
        self.locks.load(Ordering::Relaxed) > 0
    }
}

impl ModelGrid for StructuredGrid {
    fn is_complete(&self) -> bool {
        self.complete
    }
    fn axis_bounds(&self) -> Vec<usize> {
        self.shape.clone()
    }
    fn active_flag(&self, cellid: &CellId) -> bool {
        match cellid.flat_index(&self.shape) {
            Some(index) => self.idomain.as_ref().is_none_or(|idomain| idomain[index] >= 1),
            None => false,
        }
    }
    fn num_spatial_coordinates(&self) -> usize {
        self.shape.len()
    }
    fn lock(&self) {
        self.locks.fetch_add(1, Ordering::Relaxed);
    }
    fn unlock(&self) {
        let _ = self
            .locks
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
    }
}
