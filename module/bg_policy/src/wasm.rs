//! Wasm-backed `PolicyEvaluator`.
//!
//! The module is loaded once from `OPA_POLICY_PATH` and held as an
//! `Arc<wasmtime::Module>` plus a shared `Engine`; every call to
//! `evaluate` instantiates a fresh `Store`, which is cheap relative to
//! the request and keeps evaluations independent of each other (no
//! shared linear memory, no leftover state between requests).
//!
//! ## Guest ABI
//!
//! The module exports:
//! - `memory`: the linear memory the host writes the input into and
//!   reads the output from.
//! - `alloc(len: i32) -> i32`: reserve `len` bytes, returning the offset.
//! - `evaluate(ptr: i32, len: i32) -> i64`: evaluate the input JSON
//!   written at `ptr..ptr+len`, returning the output buffer packed as
//!   `(offset << 32) | length`.

use crate::evaluator::{ interpret_results, validate_input, PolicyEvaluator };
use async_trait::async_trait;
use bg_types::BgError;
use serde_json::Value;
use std::sync::Arc;
use wasmtime::{ Engine, Instance, Module, Store };

pub struct WasmPolicyEvaluator
{
  engine: Engine,
  module: Arc<Module>,
}

impl WasmPolicyEvaluator
{
  /// Load and compile the module at `path`.
  ///
  /// # Errors
  ///
  /// Returns an error if the file is missing or fails to compile as a
  /// valid Wasm module.
  pub fn load(path: &str) -> anyhow::Result<Self>
  {
    let engine = Engine::default();
    let module = Module::from_file(&engine, path)?;
    Ok(Self { engine, module: Arc::new(module) })
  }

  fn run(&self, input_bytes: &[u8]) -> anyhow::Result<Vec<u8>>
  {
    let mut store = Store::new(&self.engine, ());
    let instance = Instance::new(&mut store, &self.module, &[])?;

    let alloc = instance.get_typed_func::<i32, i32>(&mut store, "alloc")?;
    let evaluate = instance.get_typed_func::<(i32, i32), i64>(&mut store, "evaluate")?;
    let memory = instance.get_memory(&mut store, "memory").ok_or_else(|| anyhow::anyhow!("module does not export memory"))?;

    let input_ptr = alloc.call(&mut store, input_bytes.len() as i32)?;
    memory.write(&mut store, input_ptr as usize, input_bytes)?;

    let packed = evaluate.call(&mut store, (input_ptr, input_bytes.len() as i32))?;
    let out_ptr = (packed >> 32) as usize;
    let out_len = (packed & 0xFFFF_FFFF) as usize;

    let mut output = vec![0u8; out_len];
    memory.read(&store, out_ptr, &mut output)?;
    Ok(output)
  }
}

#[async_trait]
impl PolicyEvaluator for WasmPolicyEvaluator
{
  async fn evaluate(&self, input: &Value) -> Result<bool, BgError>
  {
    validate_input(input)?;

    let input_bytes = serde_json::to_vec(input).map_err(|err| BgError::Internal(err.to_string()))?;

    let output = self.run(&input_bytes).map_err(|err| {
      tracing::warn!(%err, "policy module evaluation failed");
      BgError::Internal("policy evaluation failed".to_string())
    })?;

    interpret_results(&output)
  }
}
