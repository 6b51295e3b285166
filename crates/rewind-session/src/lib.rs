pub mod coordinator;
pub mod engine;
pub mod gesture;
pub mod local_engine;
pub mod notify;
pub mod selection;
pub mod session;
pub mod view;

pub use coordinator::{RestoreCoordinator, RestoreOutcome, RestorePlan};
pub use engine::{EngineError, EnginePush, RestoreAck, RestoreEngine};
pub use gesture::GestureDetector;
pub use local_engine::LocalEngine;
pub use notify::{CollectNotifier, Notice, Notifier};
pub use selection::{
    RestoreIntent, RestoreOptions, Selection, SelectionMachine, SelectionMode, Step,
};
pub use session::{Input, InputContext, Session};
