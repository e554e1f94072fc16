//! Local completion items built from the keyword tables.

use std::sync::LazyLock;

use tower_lsp_server::ls_types::{
    CompletionItem, CompletionItemKind, Documentation, InsertTextFormat, MarkupContent, MarkupKind,
};

use super::keywords::{BUILTIN_FUNCTIONS, COMMON_HEADERS, CONSTANTS, LOOP_VARIABLES};
use super::reference::documentation;

fn markdown(value: impl Into<String>) -> Documentation {
    Documentation::MarkupContent(MarkupContent {
        kind: MarkupKind::Markdown,
        value: value.into(),
    })
}

/// Documentation from the reference table, or `fallback`.
fn described(name: &str, fallback: &str) -> Documentation {
    markdown(
        documentation(name)
            .map(|entry| entry.description)
            .unwrap_or(fallback),
    )
}

fn snippet(
    label: &str,
    kind: CompletionItemKind,
    detail: &str,
    documentation: Documentation,
    insert_text: &str,
) -> CompletionItem {
    CompletionItem {
        label: label.to_string(),
        kind: Some(kind),
        detail: Some(detail.to_string()),
        documentation: Some(documentation),
        insert_text: Some(insert_text.to_string()),
        insert_text_format: Some(InsertTextFormat::SNIPPET),
        ..Default::default()
    }
}

fn plain(label: &str, kind: CompletionItemKind, detail: &str) -> CompletionItem {
    CompletionItem {
        label: label.to_string(),
        kind: Some(kind),
        detail: Some(detail.to_string()),
        ..Default::default()
    }
}

const LOOPS: &[(&str, &str, &str, &str)] = &[
    ("foreach", "Basilisk iteration", "Iterate over all cells", "foreach() {\n\t$0\n}"),
    ("foreach_face", "Face iteration", "Iterate over faces", "foreach_face(${1:x}) {\n\t$0\n}"),
    ("foreach_vertex", "Vertex iteration", "Iterate over vertices", "foreach_vertex() {\n\t$0\n}"),
    (
        "foreach_boundary",
        "Boundary iteration",
        "Iterate over boundary cells",
        "foreach_boundary(${1|left,right,top,bottom,front,back|}) {\n\t$0\n}",
    ),
    ("foreach_dimension", "Dimension loop", "Loop over dimensions", "foreach_dimension() {\n\t$0\n}"),
    ("foreach_neighbor", "Neighbor iteration", "Iterate over neighbors", "foreach_neighbor(${1:1}) {\n\t$0\n}"),
    ("foreach_level", "Level iteration", "Iterate over level", "foreach_level(${1:level}) {\n\t$0\n}"),
    ("foreach_leaf", "Leaf iteration", "Iterate over leaf cells", "foreach_leaf() {\n\t$0\n}"),
    ("foreach_cell", "Cell iteration", "Iterate over all cells", "foreach_cell() {\n\t$0\n}"),
    ("foreach_child", "Child iteration", "Iterate over children", "foreach_child() {\n\t$0\n}"),
];

const EVENT_TEMPLATES: &[(&str, &str, &str, &str)] = &[
    (
        "event init",
        "Initialization event",
        "Event triggered at the start of the simulation (i = 0)",
        "event init (i = 0) {\n\t$0\n}",
    ),
    (
        "event logfile",
        "Logging event",
        "Event for logging output every iteration",
        "event logfile (i++) {\n\tfprintf(stderr, \"i = %d, t = %g\\\\n\", i, t);\n\t$0\n}",
    ),
    (
        "event adapt",
        "Adaptation event",
        "Event for adaptive mesh refinement",
        "event adapt (i++) {\n\tadapt_wavelet({${1:f}}, (double[]){${2:1e-3}}, ${3:8});\n}",
    ),
    (
        "event movies",
        "Output event",
        "Event for periodic output/visualization",
        "event movies (t += ${1:0.1}; t <= ${2:10}) {\n\toutput_ppm(${3:f}, fopen(\"${4:field}.ppm\", \"w\"));\n}",
    ),
    ("event end", "End condition", "Event that ends the simulation", "event end (t = ${1:10}) {\n\t$0\n}"),
];

/// (label, reference name, detail, fallback, insert text)
const FIELD_DECLARATIONS: &[(&str, &str, &str, &str, &str)] = &[
    ("scalar", "scalar", "Scalar field", "Scalar field type", "scalar ${1:f}[];"),
    ("vector", "vector", "Vector field", "Vector field type", "vector ${1:u}[];"),
    ("tensor", "tensor", "Tensor field", "Tensor field type", "tensor ${1:T}[];"),
    ("face vector", "face", "Face-centered vector", "Face-centered vector field", "face vector ${1:uf}[];"),
    ("vertex scalar", "vertex", "Vertex-centered scalar", "Vertex-centered scalar field", "vertex scalar ${1:psi}[];"),
    ("coord", "coord", "Coordinate struct", "Coordinate type", "coord ${1:pos} = {${2:0}, ${3:0}, ${4:0}};"),
];

const TEMPLATES: &[(&str, &str, &str, &str)] = &[
    (
        "main",
        "Main function template",
        "Basic Basilisk main function template",
        "int main() {\n\tinit_grid(${1:64});\n\trun();\n}",
    ),
    (
        "main_mpi",
        "MPI main function",
        "Basilisk main function with MPI initialization",
        "int main(int argc, char *argv[]) {\n\tMPI_Init(&argc, &argv);\n\tinit_grid(${1:64});\n\trun();\n\tMPI_Finalize();\n\treturn 0;\n}",
    ),
    (
        "boundary_dirichlet",
        "Dirichlet BC",
        "Set a Dirichlet (fixed value) boundary condition",
        "${1:f}[${2|left,right,top,bottom,front,back|}] = dirichlet(${3:0});",
    ),
    (
        "boundary_neumann",
        "Neumann BC",
        "Set a Neumann (fixed gradient) boundary condition",
        "${1:f}[${2|left,right,top,bottom,front,back|}] = neumann(${3:0});",
    ),
];

/// Builtins that get a dedicated snippet instead of a plain function item.
const SNIPPET_FUNCTIONS: &[&str] = &["adapt_wavelet"];

fn build_completion_items() -> Vec<CompletionItem> {
    let mut items = Vec::new();

    for (label, detail, fallback, insert) in LOOPS {
        items.push(snippet(label, CompletionItemKind::KEYWORD, detail, described(label, fallback), insert));
    }
    items.push(snippet(
        "event",
        CompletionItemKind::KEYWORD,
        "Event handler",
        described("event", "Define an event handler"),
        "event ${1:name} (${2|i = 0,t = 0,i++,t++,t += 0.1|}) {\n\t$0\n}",
    ));
    for (label, detail, doc, insert) in EVENT_TEMPLATES {
        items.push(snippet(label, CompletionItemKind::SNIPPET, detail, markdown(*doc), insert));
    }
    for (label, name, detail, fallback, insert) in FIELD_DECLARATIONS {
        items.push(snippet(
            label,
            CompletionItemKind::TYPE_PARAMETER,
            detail,
            described(name, fallback),
            insert,
        ));
    }

    for func in BUILTIN_FUNCTIONS.iter().filter(|f| !SNIPPET_FUNCTIONS.contains(*f)) {
        let mut item = plain(func, CompletionItemKind::FUNCTION, "Basilisk function");
        item.documentation = documentation(func).map(|entry| markdown(entry.description_with_example()));
        items.push(item);
    }
    for constant in CONSTANTS {
        let mut item = plain(constant, CompletionItemKind::CONSTANT, "Basilisk constant");
        item.documentation = documentation(constant).map(|entry| markdown(entry.description));
        items.push(item);
    }
    for variable in LOOP_VARIABLES {
        let mut item = plain(variable, CompletionItemKind::VARIABLE, "Loop variable");
        item.documentation = documentation(variable).map(|entry| markdown(entry.description));
        items.push(item);
    }
    for header in COMMON_HEADERS {
        let mut item = plain(header, CompletionItemKind::FILE, "Basilisk header");
        item.insert_text = Some(format!("#include \"{}\"", header));
        item.insert_text_format = Some(InsertTextFormat::PLAIN_TEXT);
        items.push(item);
    }

    for (label, detail, doc, insert) in TEMPLATES {
        items.push(snippet(label, CompletionItemKind::SNIPPET, detail, markdown(*doc), insert));
    }
    items.push(snippet(
        "reduction",
        CompletionItemKind::KEYWORD,
        "Parallel reduction",
        described("reduction", "Parallel reduction operator"),
        "reduction(${1|+,*,min,max|}:${2:var})",
    ));
    items.push(snippet(
        "adapt_wavelet",
        CompletionItemKind::FUNCTION,
        "Adaptive refinement",
        described("adapt_wavelet", "Wavelet-based adaptation"),
        "adapt_wavelet({${1:f}}, (double[]){${2:1e-3}}, ${3:maxlevel});",
    ));

    dedup_by_label(items)
}

/// Keeps the first item for each label.
fn dedup_by_label(items: Vec<CompletionItem>) -> Vec<CompletionItem> {
    let mut seen = std::collections::HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.label.clone()))
        .collect()
}

static COMPLETION_ITEMS: LazyLock<Vec<CompletionItem>> = LazyLock::new(build_completion_items);

/// Every local completion item. Built on first use.
pub fn completion_items() -> &'static [CompletionItem] {
    &COMPLETION_ITEMS
}

/// Items offered inside `#include "` or `#include <`.
pub fn header_items() -> Vec<CompletionItem> {
    completion_items()
        .iter()
        .filter(|item| item.label.ends_with(".h") || item.label.contains('/'))
        .cloned()
        .collect()
}

/// Items offered after `ident.`.
pub fn component_items() -> Vec<CompletionItem> {
    [("x", "X component"), ("y", "Y component"), ("z", "Z component (3D)")]
        .iter()
        .map(|(label, detail)| plain(label, CompletionItemKind::FIELD, detail))
        .collect()
}
