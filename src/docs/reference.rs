//! Reference documentation for core Basilisk constructs.

/// One documented construct.
#[derive(Debug, Clone, Copy)]
pub struct DocEntry {
    pub name: &'static str,
    pub signature: &'static str,
    pub description: &'static str,
    pub example: Option<&'static str>,
    pub see_also: &'static [&'static str],
}

const fn entry(
    name: &'static str,
    signature: &'static str,
    description: &'static str,
    example: Option<&'static str>,
    see_also: &'static [&'static str],
) -> DocEntry {
    DocEntry {
        name,
        signature,
        description,
        example,
        see_also,
    }
}

pub const DOCUMENTATION: &[DocEntry] = &[
    entry(
        "foreach",
        "foreach() { ... }",
        "Iterates over all cells in the grid. This is the primary iteration construct in Basilisk for performing operations on scalar and vector fields.",
        Some("foreach()\n  f[] = x*x + y*y;"),
        &["foreach_face", "foreach_vertex", "foreach_boundary"],
    ),
    entry(
        "foreach_face",
        "foreach_face([x|y|z]) { ... }",
        "Iterates over all faces in the specified direction. Without an argument, iterates over all faces. Face-centered values are accessed using the face iterator.",
        Some("face vector u[];\nforeach_face(x)\n  u.x[] = 1.0;"),
        &["foreach", "face"],
    ),
    entry(
        "foreach_vertex",
        "foreach_vertex() { ... }",
        "Iterates over all vertices (cell corners) in the grid. Useful for vertex-centered schemes.",
        Some("vertex scalar psi[];\nforeach_vertex()\n  psi[] = x*y;"),
        &["foreach", "vertex"],
    ),
    entry(
        "foreach_boundary",
        "foreach_boundary(direction) { ... }",
        "Iterates over all boundary cells in the specified direction (left, right, top, bottom, front, back).",
        Some("foreach_boundary(left)\n  u.x[] = 0;"),
        &["dirichlet", "neumann"],
    ),
    entry(
        "foreach_dimension",
        "foreach_dimension() { ... }",
        "Replicates the code block for each spatial dimension. Variables x, y, z are automatically permuted.",
        Some("foreach_dimension()\n  u.x[] = 0;  // Sets u.x, u.y, u.z to 0"),
        &["foreach"],
    ),
    entry(
        "foreach_neighbor",
        "foreach_neighbor([stencil_size]) { ... }",
        "Nested loop over neighboring cells. Must be used inside a foreach loop. Default stencil size is 1.",
        Some("foreach()\n  foreach_neighbor(1)\n    total += f[];"),
        &["foreach"],
    ),
    entry(
        "foreach_level",
        "foreach_level(level) { ... }",
        "Iterates over all cells at a specific refinement level in adaptive (tree) grids.",
        None,
        &["foreach", "adapt_wavelet"],
    ),
    entry(
        "foreach_leaf",
        "foreach_leaf() { ... }",
        "Iterates over all leaf cells (finest level) in adaptive (tree) grids.",
        None,
        &["foreach", "foreach_level"],
    ),
    entry(
        "foreach_cell",
        "foreach_cell() { ... }",
        "Iterates over all cells including non-leaf cells in adaptive grids.",
        None,
        &["foreach", "foreach_leaf"],
    ),
    entry(
        "foreach_child",
        "foreach_child() { ... }",
        "Iterates over child cells of the current cell in adaptive grids. Must be nested in foreach_cell.",
        None,
        &["foreach_cell"],
    ),
    entry(
        "event",
        "event name (condition) { ... }",
        "Defines an event handler that is triggered when the condition is met. Common conditions include iteration counts (i++), time (t++), and specific values (t = 0).",
        Some("event init (i = 0) {\n  // Initialization code\n}\n\nevent output (t += 0.1) {\n  // Output every 0.1 time units\n}"),
        &["run", "i", "t"],
    ),
    entry(
        "reduction",
        "reduction(op:var)",
        "Specifies a parallel reduction operation within a foreach loop. Operations: +, *, min, max. Essential for MPI parallel computations.",
        Some("double total = 0;\nforeach(reduction(+:total))\n  total += f[];"),
        &["foreach", "mpi_all_reduce"],
    ),
    entry(
        "scalar",
        "scalar name[, name2, ...];",
        "Declares a scalar field. Scalar fields store one value per cell and can be accessed with [] notation.",
        Some("scalar f[], g[];\n\nforeach()\n  f[] = sin(x);"),
        &["vector", "tensor", "face"],
    ),
    entry(
        "vector",
        "vector name[, name2, ...];",
        "Declares a vector field with components for each dimension. Components are accessed as name.x, name.y, name.z.",
        Some("vector u[];\n\nforeach() {\n  u.x[] = 1.0;\n  u.y[] = 0.0;\n}"),
        &["scalar", "face", "tensor"],
    ),
    entry(
        "tensor",
        "tensor name[];",
        "Declares a tensor field. Components are accessed as name.x.x, name.x.y, etc.",
        Some("tensor T[];\n\nforeach()\n  T.x.y[] = 0.5*(du.x + dv.y);"),
        &["vector", "symmetric"],
    ),
    entry(
        "face",
        "face vector name[];",
        "Declares a face-centered vector field. Values are stored at cell faces rather than cell centers.",
        Some("face vector uf[];\n\nforeach_face(x)\n  uf.x[] = 1.0;"),
        &["vector", "foreach_face"],
    ),
    entry(
        "vertex",
        "vertex scalar name[];",
        "Declares a vertex-centered scalar field. Values are stored at cell corners.",
        Some("vertex scalar psi[];\n\nforeach_vertex()\n  psi[] = stream_function(x, y);"),
        &["scalar", "foreach_vertex"],
    ),
    entry(
        "coord",
        "coord name;",
        "A structure representing coordinates with x, y, z components. Not a field type.",
        Some("coord center = {0.5, 0.5, 0.5};\ncoord velocity = {u.x[], u.y[], u.z[]};"),
        &["vector", "point"],
    ),
    entry(
        "run",
        "run()",
        "Starts the simulation loop. Events are processed in order of their conditions. Returns when the simulation ends.",
        Some("int main() {\n  init_grid(64);\n  run();\n}"),
        &["event", "init_grid"],
    ),
    entry(
        "init_grid",
        "init_grid(int n)",
        "Initializes the computational grid with n cells in each direction. For adaptive grids, this sets the initial resolution.",
        Some("init_grid(128);  // 128x128 grid (2D) or 128x128x128 (3D)"),
        &["run", "N", "L0"],
    ),
    entry(
        "adapt_wavelet",
        "adapt_wavelet({fields}, (double[]){errors}, maxlevel[, minlevel])",
        "Adapts the grid based on wavelet error estimates. Fields are refined where the error exceeds the threshold.",
        Some("adapt_wavelet({f, u}, (double[]){1e-3, 1e-2}, 8, 4);"),
        &["refine", "unrefine", "foreach_level"],
    ),
    entry(
        "diffusion",
        "diffusion(scalar f, double dt, face vector D)",
        "Solves the diffusion equation df/dt = div(D*grad(f)) for one time step.",
        Some("face vector D[];\nforeach_face()\n  D.x[] = 0.01;\ndiffusion(f, dt, D);"),
        &["poisson", "advection"],
    ),
    entry(
        "poisson",
        "poisson(scalar a, scalar b, face vector alpha, scalar lambda)",
        "Solves the Poisson equation div(alpha*grad(a)) + lambda*a = b.",
        Some("poisson(p, div_u, fm, zerof);"),
        &["diffusion", "mg_solve"],
    ),
    entry(
        "output_ppm",
        "output_ppm(scalar f, FILE *fp[, options])",
        "Outputs a scalar field as a PPM image. Options include min, max, linear, box, mask.",
        Some("output_ppm(f, fopen(\"f.ppm\", \"w\"), linear = true);"),
        &["output_gfs", "output_vtu", "dump"],
    ),
    entry(
        "dump",
        "dump([file = \"dump\"])",
        "Saves the complete simulation state to a file for checkpointing or post-processing.",
        Some("event snapshots (t += 1.0)\n  dump();"),
        &["restore", "output_gfs"],
    ),
    entry(
        "restore",
        "restore([file = \"dump\"])",
        "Restores the simulation state from a dump file.",
        Some("event init (i = 0) {\n  if (!restore())\n    // Initialize from scratch\n}"),
        &["dump"],
    ),
    entry(
        "dirichlet",
        "f[direction] = dirichlet(value)",
        "Sets a Dirichlet (fixed value) boundary condition.",
        Some("u.t[top] = dirichlet(0);  // No-slip\nf[left] = dirichlet(1);  // Fixed value"),
        &["neumann", "periodic"],
    ),
    entry(
        "neumann",
        "f[direction] = neumann(value)",
        "Sets a Neumann (fixed gradient) boundary condition.",
        Some("f[right] = neumann(0);  // Zero gradient (outflow)"),
        &["dirichlet", "periodic"],
    ),
    entry(
        "fraction",
        "fraction(scalar c, geometry)",
        "Computes the volume fraction of a geometry in each cell. Used for VOF (Volume of Fluid) methods.",
        Some("fraction(f, sq(x) + sq(y) - sq(0.1));  // Circle of radius 0.1"),
        &["vof", "curvature"],
    ),
    entry(
        "interpolate",
        "interpolate(scalar f, double x, double y[, double z])",
        "Returns the interpolated value of field f at coordinates (x,y,z).",
        Some("double val = interpolate(f, 0.5, 0.5);"),
        &["foreach"],
    ),
    entry(
        "statsf",
        "statsf(scalar f)",
        "Returns statistics (min, max, sum, volume) for a scalar field.",
        Some("stats s = statsf(f);\nprintf(\"min=%g max=%g\\n\", s.min, s.max);"),
        &["normf", "change"],
    ),
    entry(
        "normf",
        "normf(scalar f)",
        "Returns the L1, L2, and Linf norms of a scalar field.",
        Some("norm n = normf(f);\nprintf(\"L2 norm = %g\\n\", n.rms);"),
        &["statsf", "change"],
    ),
    entry(
        "Delta",
        "Delta",
        "The cell size at the current position. In adaptive grids, this varies with refinement level.",
        Some("foreach()\n  volume += sq(Delta);  // 2D cell area"),
        &["level", "x", "y", "z"],
    ),
    entry(
        "level",
        "level",
        "The refinement level of the current cell in adaptive grids. Higher levels = finer resolution.",
        Some("foreach()\n  if (level < 5)\n    refine(true);"),
        &["Delta", "depth", "adapt_wavelet"],
    ),
    entry(
        "t",
        "t",
        "The current simulation time. Updated automatically by the timestepping loop.",
        Some("event output (t += 0.1; t <= 10)\n  printf(\"t = %g\\n\", t);"),
        &["dt", "i", "event"],
    ),
    entry(
        "dt",
        "dt",
        "The current time step size. Can be set manually or computed by CFL conditions.",
        Some("DT = 0.01;  // Maximum time step\nevent adapt (i++) {\n  dt = dtnext(DT);\n}"),
        &["t", "DT"],
    ),
    entry(
        "i",
        "i",
        "The current iteration count. Updated automatically each timestep.",
        Some("event output (i += 100)\n  printf(\"iteration %d, t = %g\\n\", i, t);"),
        &["t", "event"],
    ),
    entry(
        "N",
        "N",
        "The number of grid cells in each direction (set by init_grid or command line).",
        Some("init_grid(N);  // N can be passed as -N argument"),
        &["init_grid", "L0"],
    ),
    entry(
        "L0",
        "L0",
        "The domain size. Default is 1.0. The domain extends from (X0,Y0,Z0) to (X0+L0, Y0+L0, Z0+L0).",
        Some("L0 = 10.;  // Domain from 0 to 10\nX0 = -L0/2;  // Center at origin"),
        &["X0", "Y0", "Z0", "N"],
    ),
    entry(
        "pid",
        "pid()",
        "Returns the MPI process ID (rank). Returns 0 for non-MPI runs.",
        Some("if (pid() == 0)\n  printf(\"Running on %d processes\\n\", npe());"),
        &["npe", "MPI_Comm_rank"],
    ),
    entry(
        "npe",
        "npe()",
        "Returns the total number of MPI processes. Returns 1 for non-MPI runs.",
        Some("printf(\"Process %d of %d\\n\", pid(), npe());"),
        &["pid", "MPI_Comm_size"],
    ),
];

pub fn documentation(name: &str) -> Option<&'static DocEntry> {
    DOCUMENTATION.iter().find(|entry| entry.name == name)
}

impl DocEntry {
    /// Markdown with signature, description, example and see-also.
    pub fn markdown(&self) -> String {
        let mut markdown = format!("**{}**\n\n{}", self.signature, self.description);
        if let Some(example) = self.example {
            markdown.push_str(&format!("\n\n**Example:**\n```c\n{}\n```", example));
        }
        if !self.see_also.is_empty() {
            markdown.push_str(&format!("\n\n**See also:** {}", self.see_also.join(", ")));
        }
        markdown
    }

    /// Description followed by the example, for completion documentation.
    pub(crate) fn description_with_example(&self) -> String {
        match self.example {
            Some(example) => format!(
                "{}\n\n**Example:**\n```c\n{}\n```",
                self.description, example
            ),
            None => self.description.to_string(),
        }
    }
}

pub fn hover_markdown(word: &str) -> Option<String> {
    documentation(word).map(DocEntry::markdown)
}
