//! Built-in codelets.
//!
//! Small kernels that exercise every scheduling path: plain writes, read-writes,
//! long-running bodies, and memory codelets that claim address ranges. Vector kernels
//! treat a register as consecutive big-endian u64 lanes, matching `LDIMM` for 64B registers.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::common::constants::MAX_NUM_OPERANDS;
use crate::common::error::{SimError, SimResult};
use crate::common::range::MemoryRange;
use crate::common::reg::RegisterFile;
use crate::isa::codelet::{Codelet, CodeletRegistry, ExecutionContext};
use crate::isa::instruction::Operand;
use crate::isa::opcodes::OpIo;

/// Adds every built-in codelet to `registry`.
pub fn register_builtins(registry: &mut CodeletRegistry) {
    registry.register("copy", || Arc::new(CopyRegister));
    registry.register("vec_add", || Arc::new(VecAdd));
    registry.register("scale", || Arc::new(Scale));
    registry.register("sleep", || Arc::new(Sleep));
    registry.register("load_block", || Arc::new(LoadBlock));
    registry.register("store_block", || Arc::new(StoreBlock));
}

fn lanes(bytes: &[u8]) -> impl Iterator<Item = u64> + '_ {
    bytes.chunks(8).map(|chunk| {
        chunk
            .iter()
            .fold(0u64, |acc, byte| (acc << 8) | u64::from(*byte))
    })
}

fn pack(lanes: impl Iterator<Item = u64>, width: usize) -> Vec<u8> {
    let mut out: Vec<u8> = lanes.flat_map(u64::to_be_bytes).collect();
    out.resize(width, 0);
    out
}

/// Operand `index` as a lane source: a register's lanes or an immediate broadcast.
fn lane_source(ctx: &ExecutionContext<'_>, index: usize, width: usize) -> SimResult<Vec<u64>> {
    match ctx.operand(index) {
        Operand::Register(_) => Ok(lanes(&ctx.read(index)?).collect()),
        _ => Ok(vec![ctx.value(index)?; width.div_ceil(8)]),
    }
}

fn block_range(
    name: &str,
    operands: &[Operand; MAX_NUM_OPERANDS],
    registers: &RegisterFile,
    write: bool,
) -> SimResult<Vec<MemoryRange>> {
    let invalid = |index, expected| SimError::InvalidOperand {
        instruction: format!("COD {name}"),
        index,
        expected,
    };
    let size = operands[0]
        .register()
        .ok_or_else(|| invalid(0, "a register"))?
        .byte_size() as u64;
    let address = operands[1]
        .read_value(registers)?
        .ok_or_else(|| invalid(1, "an address"))?;
    Ok(vec![if write {
        MemoryRange::write(address, size)
    } else {
        MemoryRange::read(address, size)
    }])
}

/// `COD copy dst, src`
#[derive(Debug)]
pub struct CopyRegister;

impl Codelet for CopyRegister {
    fn name(&self) -> &str {
        "copy"
    }

    fn io_mask(&self) -> OpIo {
        OpIo::OP1_WR | OpIo::OP2_RD
    }

    fn run(&self, ctx: &ExecutionContext<'_>) -> SimResult<()> {
        let src = ctx.read(1)?;
        ctx.write(0, &src)
    }
}

/// `COD vec_add dst, a, b`: lane-wise wrapping addition; `b` may be an immediate.
#[derive(Debug)]
pub struct VecAdd;

impl Codelet for VecAdd {
    fn name(&self) -> &str {
        "vec_add"
    }

    fn io_mask(&self) -> OpIo {
        OpIo::OP1_WR | OpIo::OP2_RD | OpIo::OP3_RD
    }

    fn run(&self, ctx: &ExecutionContext<'_>) -> SimResult<()> {
        let width = ctx.register(0)?.byte_size();
        let a = lane_source(ctx, 1, width)?;
        let b = lane_source(ctx, 2, width)?;
        let sum = a.iter().zip(b.iter()).map(|(x, y)| x.wrapping_add(*y));
        ctx.write(0, &pack(sum, width))
    }
}

/// `COD scale acc, factor`: multiplies every lane of `acc` in place.
#[derive(Debug)]
pub struct Scale;

impl Codelet for Scale {
    fn name(&self) -> &str {
        "scale"
    }

    fn io_mask(&self) -> OpIo {
        OpIo::OP1_RD | OpIo::OP1_WR | OpIo::OP2_RD
    }

    fn run(&self, ctx: &ExecutionContext<'_>) -> SimResult<()> {
        let acc = ctx.read(0)?;
        let factor = ctx.value(1)?;
        let scaled = lanes(&acc).map(|lane| lane.wrapping_mul(factor));
        ctx.write(0, &pack(scaled, acc.len()))
    }
}

/// `COD sleep millis`
#[derive(Debug)]
pub struct Sleep;

impl Codelet for Sleep {
    fn name(&self) -> &str {
        "sleep"
    }

    fn io_mask(&self) -> OpIo {
        OpIo::NONE
    }

    fn run(&self, ctx: &ExecutionContext<'_>) -> SimResult<()> {
        let millis = ctx.value(0)?;
        thread::sleep(Duration::from_millis(millis));
        Ok(())
    }
}

/// `COD load_block dst, addr`: fills `dst` from memory.
#[derive(Debug)]
pub struct LoadBlock;

impl Codelet for LoadBlock {
    fn name(&self) -> &str {
        "load_block"
    }

    fn io_mask(&self) -> OpIo {
        OpIo::OP1_WR | OpIo::OP2_RD
    }

    fn is_memory_codelet(&self) -> bool {
        true
    }

    fn is_address_operand(&self, index: usize) -> bool {
        index == 1
    }

    fn memory_ranges(
        &self,
        operands: &[Operand; MAX_NUM_OPERANDS],
        registers: &RegisterFile,
    ) -> SimResult<Vec<MemoryRange>> {
        block_range(self.name(), operands, registers, false)
    }

    fn run(&self, ctx: &ExecutionContext<'_>) -> SimResult<()> {
        let width = ctx.register(0)?.byte_size();
        let data = ctx.memory().read(ctx.value(1)?, width)?;
        ctx.write(0, &data)
    }
}

/// `COD store_block src, addr`: writes `src` to memory.
#[derive(Debug)]
pub struct StoreBlock;

impl Codelet for StoreBlock {
    fn name(&self) -> &str {
        "store_block"
    }

    fn io_mask(&self) -> OpIo {
        OpIo::OP1_RD | OpIo::OP2_RD
    }

    fn is_memory_codelet(&self) -> bool {
        true
    }

    fn is_address_operand(&self, index: usize) -> bool {
        index == 1
    }

    fn memory_ranges(
        &self,
        operands: &[Operand; MAX_NUM_OPERANDS],
        registers: &RegisterFile,
    ) -> SimResult<Vec<MemoryRange>> {
        block_range(self.name(), operands, registers, true)
    }

    fn run(&self, ctx: &ExecutionContext<'_>) -> SimResult<()> {
        let data = ctx.read(0)?;
        ctx.memory().write(ctx.value(1)?, &data)
    }
}
