pub mod archive;
pub mod evolution_engine;
pub mod generator;
pub mod logbook;
pub mod operators;
pub mod pareto;
pub mod pretest;
pub mod primitive_set;
pub mod progress;
pub mod tree;
pub mod validator;

pub use archive::ParetoArchive;
pub use evolution_engine::{EvolutionEngine, SearchData, SearchOutcome};
pub use generator::{gen_grow_safe, generate};
pub use logbook::{LogRecord, Logbook};
pub use operators::MAX_MUT_LOOPS;
pub use pretest::{PretestHarness, MAX_EVAL_SECS, NUM_TESTS};
pub use primitive_set::{Primitive, PrimitiveSet, Terminal, TypeTag};
pub use progress::{ConsoleProgressCallback, ProgressCallback};
pub use tree::{Generation, Individual, Lineage, Node, NodeKind, Tree};
pub use validator::StructureValidator;
