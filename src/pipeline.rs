//! Compilation pipeline: parse → locate → analyze → transform → print.
//!
//! Analysis reads the untouched tree and produces one typed result per stage.
//! Transforms then mutate the class in a fixed order; the order fixes the layout
//! of `disconnectedCallback` (listener removals, then watcher teardown, then the
//! author's own statements).

use crate::class_locator::{self, ClassLocation};
use crate::dom;
use crate::error::{CompileError, ErrorCode, ErrorSink};
use crate::events::{self, EventBinding};
use crate::nodes::{self, NodeTracker};
use crate::options::CompileOptions;
use crate::render::{self, RenderSource};
use crate::shell;
use crate::state::{self, StateMap};
use crate::syntax;
use crate::template;
use crate::watchers;
use oxc_allocator::Allocator;
use oxc_ast::ast::Program;

/// Everything learned about the component before any rewriting.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub location: ClassLocation,
    pub state: StateMap,
    pub nodes: NodeTracker,
    pub render: RenderSource,
    pub events: Vec<EventBinding>,
}

fn lost_class() -> CompileError {
    CompileError::with_message(ErrorCode::Internal, "component class is no longer at its location")
}

pub fn analyze(
    program: &Program,
    location: ClassLocation,
    source: &str,
) -> Result<Analysis, CompileError> {
    let class = location.class(program).ok_or_else(lost_class)?;
    shell::check_lifecycle(class, source)?;
    let state = state::analyze(class);
    let nodes = nodes::analyze(class, source)?;
    let render = render::analyze(class, source)?;
    let events = events::collect(class, source)?;
    Ok(Analysis {
        location,
        state,
        nodes,
        render,
        events,
    })
}

/// Compile with default options.
pub fn compile(source: &str) -> Result<String, CompileError> {
    compile_with_options(source, &CompileOptions::default())
}

/// Compile one module. Sources without a component class come back unchanged.
///
/// Errors carry `source` and `options.file_id`, so [`CompileError::render`] can
/// print them on its own.
pub fn compile_with_options(
    source: &str,
    options: &CompileOptions,
) -> Result<String, CompileError> {
    run(source, options).map_err(|e| e.in_file(options.file_id.as_deref()).with_source(source))
}

/// Compile, or report the error to `sink` and hand back the original source.
pub fn compile_or_passthrough(
    source: &str,
    options: &CompileOptions,
    sink: &mut dyn ErrorSink,
) -> String {
    match compile_with_options(source, options) {
        Ok(code) => code,
        Err(error) => {
            sink.report(&error, source);
            source.to_string()
        }
    }
}

fn run(source: &str, options: &CompileOptions) -> Result<String, CompileError> {
    let allocator = Allocator::default();
    let mut program = syntax::parse_program(&allocator, source)?;

    let Some(location) = class_locator::locate(&program, &options.marker_base) else {
        log::debug!("no class extends {}, source passed through", options.marker_base);
        return Ok(source.to_string());
    };
    log::debug!(
        "compiling component {}",
        location.name.as_deref().unwrap_or("<anonymous>")
    );

    let analysis = analyze(&program, location, source)?;
    let tree = template::parse_template(&analysis.render.html)
        .map_err(|e| e.at(source, analysis.render.span))?;
    let dom = dom::build(&tree, &analysis.state, &analysis.nodes, source)?;
    let groups = watchers::group(&dom.watchers);

    let class = analysis
        .location
        .class_mut(&mut program)
        .ok_or_else(lost_class)?;
    render::strip_declarations(class);
    nodes::transform(&allocator, class)?;
    shell::transform(&allocator, class, &options.element_base)?;

    let mut build = dom.statements_js();
    build.extend(watchers::subscriptions_js(&groups));
    render::install_build_method(&allocator, class, &build)?;
    watchers::install_teardown(&allocator, class, &groups)?;
    events::apply(&allocator, class, &analysis.events)?;

    Ok(syntax::print_program(&mut program))
}
