//! Simulator error definitions.
//!
//! Every fatal condition the machine can hit is a variant of [`SimError`]. Recoverable
//! conditions (data and structural hazards) never surface here; they only delay
//! scheduling.

use thiserror::Error;

use super::reg::RegId;

/// Errors produced while configuring or running the machine.
#[derive(Debug, Error)]
pub enum SimError {
    /// The fetched line has an opcode or codelet name the decoder does not know.
    #[error("unknown instruction `{text}` at pc {pc}")]
    UnknownInstruction {
        /// Program counter of the offending line.
        pc: usize,
        /// Textual form of the line.
        text: String,
    },

    /// A jump referenced a label that is not defined in the program.
    #[error("unknown label `{label}` referenced by `{instruction}`")]
    UnknownLabel {
        /// Missing label.
        label: String,
        /// Instruction that referenced it.
        instruction: String,
    },

    /// The program counter ran past the last line without reaching a COMMIT.
    #[error("program counter {pc} ran past the end of the program without COMMIT")]
    ProgramOverrun {
        /// Program counter that fell off the end.
        pc: usize,
    },

    /// An operand has the wrong type for the value or address it must produce.
    #[error("operand {index} of `{instruction}` cannot be used as {expected}")]
    InvalidOperand {
        /// Instruction holding the operand.
        instruction: String,
        /// Zero-based operand index.
        index: usize,
        /// What the operand was expected to be.
        expected: &'static str,
    },

    /// The register identity does not exist in the configured register file.
    #[error("register {0} does not exist in this register file")]
    InvalidRegister(RegId),

    /// A memory access fell outside the flat address space.
    #[error("memory access [{addr:#x}, +{len}) is outside the {size}-byte address space")]
    MemoryOutOfBounds {
        /// First byte of the access.
        addr: u64,
        /// Length of the access in bytes.
        len: usize,
        /// Size of the address space.
        size: usize,
    },

    /// No majority was reached among the copies of a duplicated codelet.
    #[error("resiliency failure: no majority among {copies} copies of `{instruction}`")]
    ResiliencyFailure {
        /// Original instruction of the duplication group.
        instruction: String,
        /// Number of copies that took part in the final vote.
        copies: usize,
    },

    /// A codelet body reported a failure.
    #[error("codelet `{name}` failed: {reason}")]
    Codelet {
        /// Codelet name.
        name: String,
        /// Failure description.
        reason: String,
    },

    /// The configuration is inconsistent.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The configuration could not be parsed.
    #[error("configuration parse error: {0}")]
    ConfigParse(#[from] serde_json::Error),

    /// An I/O error while loading configuration or spawning threads.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The run exceeded the configured tick limit before retiring COMMIT.
    #[error("tick limit of {0} reached before COMMIT")]
    TickLimit(u64),

    /// The machine already ran to completion or was halted by a fatal error.
    #[error("machine is halted")]
    Halted,

    /// Scheduler bookkeeping became inconsistent.
    #[error("internal scheduler invariant violated: {0}")]
    Internal(String),
}

/// Result alias used across the simulator.
pub type SimResult<T> = Result<T, SimError>;
