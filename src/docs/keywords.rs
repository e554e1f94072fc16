//! Basilisk C vocabulary.

/// Iteration and event constructs.
pub const CONTROL_KEYWORDS: &[&str] = &[
    "event",
    "foreach",
    "foreach_face",
    "foreach_boundary",
    "foreach_vertex",
    "foreach_dimension",
    "foreach_level",
    "foreach_leaf",
    "foreach_neighbor",
    "foreach_cell",
    "foreach_child",
    "foreach_block",
    "foreach_blockf",
    "foreach_block_inner",
    "foreach_point",
    "foreach_cache",
    "foreach_cache_level",
    "foreach_stencil",
    "reduction",
];

/// Field declarations.
pub const FIELD_TYPES: &[&str] = &[
    "scalar",
    "vector",
    "tensor",
    "face",
    "vertex",
    "symmetric",
    "coord",
    "point",
];

pub const GRID_TYPES: &[&str] = &["Grid", "Boundary", "Tree", "Quadtree", "Octree", "Point", "Cell"];

pub const BUILTIN_FUNCTIONS: &[&str] = &[
    // simulation control
    "run",
    "init_grid",
    "free_grid",
    "cartesian",
    "quadtree",
    "octree",
    "multigrid",
    // field operations
    "new",
    "delete",
    "normalize",
    "statsf",
    "normf",
    "change",
    // solvers
    "diffusion",
    "poisson",
    "project",
    "advection",
    "viscosity",
    "mg_solve",
    // adaptation
    "adapt_wavelet",
    "refine",
    "unrefine",
    "coarsen",
    // output
    "output_ppm",
    "output_gfs",
    "output_vtu",
    "output_field",
    "output_facets",
    "dump",
    "restore",
    // math
    "noise",
    "interpolate",
    "pid",
    "npe",
    "clamp",
    "fabs",
    "sq",
    "cube",
    "sign",
    "max",
    "min",
    // boundary conditions
    "dirichlet",
    "neumann",
    "periodic",
    "symmetry",
    // geometry
    "fraction",
    "curvature",
    "height",
    "facet_normal",
    "embed_gradient",
    // parallel
    "mpi_all_reduce",
    "mpi_boundary_update",
];

pub const CONSTANTS: &[&str] = &[
    "PI",
    "M_PI",
    "HUGE",
    "nodata",
    "true",
    "false",
    "NULL",
    "BGHOSTS",
    "GHOSTS",
    "TRASH",
    "N",
    "L0",
    "X0",
    "Y0",
    "Z0",
    "DT",
    "TOLERANCE",
    "NITERMAX",
    "NITERMIN",
];

/// Names visible inside `foreach` bodies.
pub const LOOP_VARIABLES: &[&str] = &[
    "x", "y", "z", "Delta", "level", "depth", "t", "dt", "i", "point", "child", "neighbor",
    "left", "right", "top", "bottom", "front", "back", "fm", "cm", "cs",
];

pub const BOUNDARY_DIRECTIONS: &[&str] = &["left", "right", "top", "bottom", "front", "back"];

pub const MPI_KEYWORDS: &[&str] = &[
    "MPI_Allreduce",
    "MPI_Barrier",
    "MPI_Bcast",
    "MPI_Comm",
    "MPI_Comm_rank",
    "MPI_Comm_size",
    "MPI_Finalize",
    "MPI_Gather",
    "MPI_Init",
    "MPI_Recv",
    "MPI_Reduce",
    "MPI_Scatter",
    "MPI_Send",
    "MPI_DOUBLE",
    "MPI_INT",
    "MPI_FLOAT",
    "MPI_COMM_WORLD",
    "MPI_SUM",
    "MPI_MAX",
    "MPI_MIN",
];

pub const COMMON_HEADERS: &[&str] = &[
    "run.h",
    "utils.h",
    "events.h",
    "common.h",
    "grid/cartesian.h",
    "grid/quadtree.h",
    "grid/octree.h",
    "grid/multigrid.h",
    "grid/multigrid-mpi.h",
    "grid/tree.h",
    "grid/bitree.h",
    "poisson.h",
    "diffusion.h",
    "navier-stokes/centered.h",
    "navier-stokes/perfs.h",
    "two-phase.h",
    "vof.h",
    "tension.h",
    "reduced.h",
    "tracer.h",
    "embed.h",
    "curvature.h",
    "fractions.h",
    "conservation.h",
    "view.h",
    "output.h",
    "draw.h",
];

/// Which table a keyword came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeywordCategory {
    Control,
    Type,
    Function,
    Constant,
    Variable,
    Mpi,
}

impl KeywordCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            KeywordCategory::Control => "control",
            KeywordCategory::Type => "type",
            KeywordCategory::Function => "function",
            KeywordCategory::Constant => "constant",
            KeywordCategory::Variable => "variable",
            KeywordCategory::Mpi => "mpi",
        }
    }
}

impl std::fmt::Display for KeywordCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Category of `word`, checking tables in a fixed order.
pub fn keyword_category(word: &str) -> Option<KeywordCategory> {
    let tables: [(&[&str], KeywordCategory); 7] = [
        (CONTROL_KEYWORDS, KeywordCategory::Control),
        (FIELD_TYPES, KeywordCategory::Type),
        (GRID_TYPES, KeywordCategory::Type),
        (BUILTIN_FUNCTIONS, KeywordCategory::Function),
        (CONSTANTS, KeywordCategory::Constant),
        (LOOP_VARIABLES, KeywordCategory::Variable),
        (MPI_KEYWORDS, KeywordCategory::Mpi),
    ];
    tables
        .iter()
        .find(|(table, _)| table.contains(&word))
        .map(|(_, category)| *category)
}

pub fn is_keyword(word: &str) -> bool {
    keyword_category(word).is_some()
}
