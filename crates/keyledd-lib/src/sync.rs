//! State synchronizer: writes indicator state to bound outputs.
//!
//! Two entry points: [`Registry::update`] for a single reported transition
//! and [`Registry::resync`] to rewrite every output from the kernel's current
//! LED state (startup, resume from suspend).

use crate::binding::{Binding, InputId};
use crate::device::{self, InputDevice, OutputDevice};
use crate::indicator::Indicator;
use crate::registry::Registry;

/// Write the payload selected by `value` to `binding`'s output.
pub fn write_binding<O: OutputDevice>(
    binding: &Binding,
    value: i32,
    outputs: &mut [O],
) -> device::Result<()> {
    let payload = binding.payload_for(value);
    let output = &mut outputs[binding.output.0];
    log::debug!(
        "[{}] {} = {value} -> {} <- {}",
        binding.name,
        binding.indicator,
        output.path().display(),
        payload.value()
    );
    output.write_payload(payload.as_bytes())
}

impl<I: InputDevice, O: OutputDevice> Registry<I, O> {
    /// Mirror one reported indicator value.
    ///
    /// Returns `Ok(false)` when no binding watches `indicator` on `input`.
    pub fn update(&mut self, input: InputId, indicator: Indicator, value: i32) -> device::Result<bool> {
        match self.table.lookup(input, indicator) {
            Some(binding) => {
                write_binding(binding, value, &mut self.outputs)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Rewrite every bound output from the current kernel LED state, in
    /// declaration order. Outputs are written even if unchanged.
    pub fn resync(&mut self) -> device::Result<()> {
        for binding in &self.table {
            let value = self.inputs[binding.input.0]
                .device
                .led_value(binding.indicator)?;
            write_binding(binding, value, &mut self.outputs)?;
        }
        log::info!("[sync]   {} LED(s) resynchronized", self.table.len());
        Ok(())
    }
}
