//! Device registry and conflict resolution.
//!
//! Resolution runs in two passes. [`plan`] validates every declaration
//! against the ones before it (indicator names, input/indicator and output
//! conflicts) and builds the shared payload cache without touching any
//! device. [`Plan::open`] then opens each distinct input device exactly once
//! and each output once, in declaration order, and builds the
//! [`BindingTable`].

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::binding::{Binding, BindingDecl, InputId, OutputId, Payload};
use crate::device::{self, DeviceOpener, InputDevice, OutputDevice};
use crate::indicator::Indicator;
use crate::table::BindingTable;

// ── Error type ──

/// Configuration-time errors. Detected before any device is opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindingError {
    /// `keyboard_led` names no known indicator.
    InvalidIndicator { binding: String, value: String },
    /// Two declarations claim the same indicator on the same input device.
    IndicatorAlreadyBound {
        binding: String,
        existing: String,
        indicator: Indicator,
        input: PathBuf,
    },
    /// Two declarations drive the same output device.
    OutputAlreadyBound {
        binding: String,
        existing: String,
        output: PathBuf,
    },
    /// Nothing to mirror.
    NoBindingsDefined,
}

impl fmt::Display for BindingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindingError::InvalidIndicator { binding, value } => write!(
                f,
                "binding \"{binding}\": invalid keyboard_led \"{value}\" (expected caps_lock, scroll_lock or num_lock)"
            ),
            BindingError::IndicatorAlreadyBound {
                binding,
                existing,
                indicator,
                input,
            } => write!(
                f,
                "binding \"{binding}\": {indicator} on {} is already bound by \"{existing}\"",
                input.display()
            ),
            BindingError::OutputAlreadyBound {
                binding,
                existing,
                output,
            } => write!(
                f,
                "binding \"{binding}\": {} is already driven by \"{existing}\"",
                output.display()
            ),
            BindingError::NoBindingsDefined => write!(f, "no LED bindings defined"),
        }
    }
}

impl std::error::Error for BindingError {}

// ── Planning ──

/// A declaration that passed validation, not yet attached to open devices.
#[derive(Debug, Clone)]
pub struct PlannedBinding {
    pub name: String,
    pub indicator: Indicator,
    pub input: InputId,
    /// Normalized brightness attribute path.
    pub output_path: PathBuf,
    pub on_payload: Rc<Payload>,
    pub off_payload: Rc<Payload>,
}

/// Validated binding set: distinct input paths plus bindings, both in
/// declaration order.
#[derive(Debug)]
pub struct Plan {
    inputs: Vec<PathBuf>,
    bindings: Vec<PlannedBinding>,
    payloads: usize,
}

impl Plan {
    /// Distinct (canonical) input device paths, in first-reference order.
    pub fn inputs(&self) -> &[PathBuf] {
        &self.inputs
    }

    pub fn input_path(&self, id: InputId) -> &Path {
        &self.inputs[id.0]
    }

    pub fn bindings(&self) -> &[PlannedBinding] {
        &self.bindings
    }

    /// Number of distinct rendered payloads.
    pub fn payload_count(&self) -> usize {
        self.payloads
    }

    /// Open every device the plan references.
    ///
    /// An input is opened when the first binding referencing it is reached,
    /// immediately before that binding's output. Any open failure aborts.
    pub fn open<D: DeviceOpener>(
        self,
        opener: &D,
    ) -> device::Result<Registry<D::Input, D::Output>> {
        let Plan {
            inputs: input_paths,
            bindings,
            ..
        } = self;

        let mut inputs: Vec<InputSlot<D::Input>> = Vec::with_capacity(input_paths.len());
        let mut outputs = Vec::with_capacity(bindings.len());
        let mut table = BindingTable::default();

        for planned in bindings {
            if planned.input.0 == inputs.len() {
                let path = &input_paths[planned.input.0];
                let device = opener.open_input(path)?;
                log::info!("[input]  {}", path.display());
                inputs.push(InputSlot {
                    path: path.clone(),
                    device,
                    fan_out: Vec::new(),
                });
            }

            let output = OutputId(outputs.len());
            outputs.push(opener.open_output(&planned.output_path)?);
            inputs[planned.input.0].fan_out.push(output);
            log::info!(
                "[output] {} <- {} \"{}\"",
                planned.output_path.display(),
                planned.indicator,
                planned.name
            );

            let inserted = table.insert(Binding {
                name: planned.name,
                indicator: planned.indicator,
                input: planned.input,
                output,
                on_payload: planned.on_payload,
                off_payload: planned.off_payload,
            });
            debug_assert!(inserted.is_ok(), "plan admitted a duplicate binding key");
        }

        Ok(Registry {
            inputs,
            outputs,
            table,
        })
    }
}

/// Validate declarations in order and build a [`Plan`].
///
/// The first declaration referencing an input path is canonical; later ones
/// share its device. Errors name the offending declaration and, for
/// conflicts, the earlier declaration it collides with.
pub fn plan(decls: &[BindingDecl]) -> Result<Plan, BindingError> {
    let mut inputs: Vec<PathBuf> = Vec::new();
    let mut input_ids: HashMap<PathBuf, InputId> = HashMap::new();
    let mut claimed: HashMap<(InputId, Indicator), usize> = HashMap::new();
    let mut output_owner: HashMap<PathBuf, usize> = HashMap::new();
    let mut payloads: HashMap<u32, Rc<Payload>> = HashMap::new();
    let mut bindings: Vec<PlannedBinding> = Vec::with_capacity(decls.len());

    for decl in decls {
        let indicator: Indicator =
            decl.keyboard_led
                .parse()
                .map_err(|_| BindingError::InvalidIndicator {
                    binding: decl.name.clone(),
                    value: decl.keyboard_led.clone(),
                })?;

        let input_path = device::canonical_path(&decl.input_device);
        let output_path = device::brightness_path(&decl.led_device);

        let input = match input_ids.get(&input_path) {
            Some(&id) => {
                if let Some(&other) = claimed.get(&(id, indicator)) {
                    return Err(BindingError::IndicatorAlreadyBound {
                        binding: decl.name.clone(),
                        existing: bindings[other].name.clone(),
                        indicator,
                        input: input_path,
                    });
                }
                log::debug!(
                    "binding \"{}\" shares input {}",
                    decl.name,
                    input_path.display()
                );
                id
            }
            None => InputId(inputs.len()),
        };

        if let Some(&other) = output_owner.get(&output_path) {
            return Err(BindingError::OutputAlreadyBound {
                binding: decl.name.clone(),
                existing: bindings[other].name.clone(),
                output: output_path,
            });
        }

        if input.0 == inputs.len() {
            inputs.push(input_path.clone());
            input_ids.insert(input_path, input);
        }

        let mut payload = |value: u32| {
            Rc::clone(
                payloads
                    .entry(value)
                    .or_insert_with(|| Rc::new(Payload::render(value))),
            )
        };
        let on_payload = payload(decl.brightness_on);
        let off_payload = payload(decl.brightness_off);

        claimed.insert((input, indicator), bindings.len());
        output_owner.insert(output_path.clone(), bindings.len());
        bindings.push(PlannedBinding {
            name: decl.name.clone(),
            indicator,
            input,
            output_path,
            on_payload,
            off_payload,
        });
    }

    if bindings.is_empty() {
        return Err(BindingError::NoBindingsDefined);
    }

    Ok(Plan {
        inputs,
        bindings,
        payloads: payloads.len(),
    })
}

/// Validate and open in one step.
pub fn resolve<D: DeviceOpener>(
    decls: &[BindingDecl],
    opener: &D,
) -> crate::error::Result<Registry<D::Input, D::Output>> {
    let plan = plan(decls)?;
    Ok(plan.open(opener)?)
}

// ── Registry ──

/// One opened input device and the outputs bound to it.
pub struct InputSlot<I> {
    pub path: PathBuf,
    pub device: I,
    pub fan_out: Vec<OutputId>,
}

/// Owns every opened device and the binding table. Bindings refer to
/// devices by index; devices are released together when the registry drops.
pub struct Registry<I, O> {
    pub(crate) inputs: Vec<InputSlot<I>>,
    pub(crate) outputs: Vec<O>,
    pub(crate) table: BindingTable,
}

impl<I: InputDevice, O: OutputDevice> Registry<I, O> {
    pub fn inputs(&self) -> &[InputSlot<I>] {
        &self.inputs
    }

    pub fn input(&self, id: InputId) -> &I {
        &self.inputs[id.0].device
    }

    pub fn output(&self, id: OutputId) -> &O {
        &self.outputs[id.0]
    }

    pub fn table(&self) -> &BindingTable {
        &self.table
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::mock::MockOpener;
    use crate::error::KeyleddError;

    fn decl(name: &str, led: &str, input: &str, output: &str) -> BindingDecl {
        BindingDecl::new(name, led, input, output)
    }

    // ── plan ──

    #[test]
    fn plan_single_binding() {
        let p = plan(&[decl("A", "caps_lock", "/dev/input/event0", "/leds/x")]).unwrap();
        assert_eq!(p.inputs(), [PathBuf::from("/dev/input/event0")]);
        assert_eq!(p.bindings().len(), 1);
        let b = &p.bindings()[0];
        assert_eq!(b.indicator, Indicator::CapsLock);
        assert_eq!(b.output_path, PathBuf::from("/leds/x/brightness"));
        assert_eq!(b.on_payload.as_bytes(), b"1\n");
        assert_eq!(b.off_payload.as_bytes(), b"0\n");
    }

    #[test]
    fn plan_empty_is_no_bindings() {
        assert_eq!(plan(&[]).unwrap_err(), BindingError::NoBindingsDefined);
    }

    #[test]
    fn plan_invalid_indicator_names_binding() {
        let err = plan(&[decl("kana", "kana_lock", "/dev/input/event0", "/leds/x")]).unwrap_err();
        assert_eq!(
            err,
            BindingError::InvalidIndicator {
                binding: "kana".into(),
                value: "kana_lock".into(),
            }
        );
    }

    #[test]
    fn plan_invalid_indicator_after_valid() {
        let err = plan(&[
            decl("A", "caps_lock", "/dev/input/event0", "/leds/x"),
            decl("B", "shift_lock", "/dev/input/event0", "/leds/y"),
        ])
        .unwrap_err();
        assert!(matches!(err, BindingError::InvalidIndicator { ref binding, .. } if binding == "B"));
    }

    #[test]
    fn plan_same_input_same_indicator_conflicts() {
        let err = plan(&[
            decl("A", "caps_lock", "/dev/input/event0", "/leds/x"),
            decl("B", "CAPS_LOCK", "/dev/input/event0", "/leds/y"),
        ])
        .unwrap_err();
        assert_eq!(
            err,
            BindingError::IndicatorAlreadyBound {
                binding: "B".into(),
                existing: "A".into(),
                indicator: Indicator::CapsLock,
                input: "/dev/input/event0".into(),
            }
        );
    }

    #[test]
    fn plan_same_indicator_different_inputs_ok() {
        let p = plan(&[
            decl("A", "caps_lock", "/dev/input/event0", "/leds/x"),
            decl("B", "caps_lock", "/dev/input/event1", "/leds/y"),
        ])
        .unwrap();
        assert_eq!(p.inputs().len(), 2);
    }

    #[test]
    fn plan_shared_output_conflicts_across_inputs() {
        let err = plan(&[
            decl("A", "caps_lock", "/dev/input/event0", "/leds/x"),
            decl("B", "num_lock", "/dev/input/event1", "/leds/x"),
        ])
        .unwrap_err();
        assert_eq!(
            err,
            BindingError::OutputAlreadyBound {
                binding: "B".into(),
                existing: "A".into(),
                output: "/leds/x/brightness".into(),
            }
        );
    }

    #[test]
    fn plan_output_conflict_through_explicit_attribute() {
        let err = plan(&[
            decl("A", "caps_lock", "/dev/input/event0", "/leds/x"),
            decl("B", "num_lock", "/dev/input/event0", "/leds/x/brightness"),
        ])
        .unwrap_err();
        assert!(matches!(err, BindingError::OutputAlreadyBound { .. }));
    }

    #[test]
    fn plan_indicator_conflict_reported_before_output_conflict() {
        let err = plan(&[
            decl("A", "caps_lock", "/dev/input/event0", "/leds/x"),
            decl("B", "caps_lock", "/dev/input/event0", "/leds/x"),
        ])
        .unwrap_err();
        assert!(matches!(err, BindingError::IndicatorAlreadyBound { .. }));
    }

    #[test]
    fn plan_dedups_inputs_in_first_reference_order() {
        let p = plan(&[
            decl("A", "caps_lock", "/dev/input/event3", "/leds/a"),
            decl("B", "caps_lock", "/dev/input/event1", "/leds/b"),
            decl("C", "num_lock", "/dev/input/event3", "/leds/c"),
            decl("D", "scroll_lock", "/dev/input/event1", "/leds/d"),
        ])
        .unwrap();
        assert_eq!(
            p.inputs(),
            [
                PathBuf::from("/dev/input/event3"),
                PathBuf::from("/dev/input/event1")
            ]
        );
        let ids: Vec<usize> = p.bindings().iter().map(|b| b.input.0).collect();
        assert_eq!(ids, [0, 1, 0, 1]);
    }

    #[test]
    fn plan_dedups_inputs_through_symlinks() {
        let dir = tempfile::tempdir().unwrap();
        let node = dir.path().join("event0");
        std::fs::write(&node, b"").unwrap();
        let link = dir.path().join("usb-Keyboard-event-kbd");
        std::os::unix::fs::symlink(&node, &link).unwrap();

        let p = plan(&[
            BindingDecl::new("A", "caps_lock", &node, "/leds/a"),
            BindingDecl::new("B", "num_lock", &link, "/leds/b"),
        ])
        .unwrap();
        assert_eq!(p.inputs().len(), 1);

        let err = plan(&[
            BindingDecl::new("A", "caps_lock", &node, "/leds/a"),
            BindingDecl::new("B", "caps_lock", &link, "/leds/b"),
        ])
        .unwrap_err();
        assert!(matches!(err, BindingError::IndicatorAlreadyBound { .. }));
    }

    #[test]
    fn plan_shares_payloads_between_bindings() {
        let p = plan(&[
            decl("A", "caps_lock", "/dev/input/event0", "/leds/a").with_brightness(255, 0),
            decl("B", "num_lock", "/dev/input/event0", "/leds/b").with_brightness(255, 0),
            decl("C", "scroll_lock", "/dev/input/event0", "/leds/c").with_brightness(1, 255),
        ])
        .unwrap();
        let b = p.bindings();
        assert!(Rc::ptr_eq(&b[0].on_payload, &b[1].on_payload));
        assert!(Rc::ptr_eq(&b[0].off_payload, &b[1].off_payload));
        // on of A and off of C both render 255
        assert!(Rc::ptr_eq(&b[0].on_payload, &b[2].off_payload));
        assert_eq!(p.payload_count(), 3);
    }

    // ── open ──

    #[test]
    fn open_each_distinct_input_once() {
        let opener = MockOpener::new();
        let decls = [
            decl("A", "caps_lock", "/dev/input/event0", "/leds/a"),
            decl("B", "num_lock", "/dev/input/event0", "/leds/b"),
            decl("C", "scroll_lock", "/dev/input/event0", "/leds/c"),
            decl("D", "caps_lock", "/dev/input/event1", "/leds/d"),
        ];
        let reg = resolve(&decls, &opener).unwrap();
        assert_eq!(
            *opener.input_opens.borrow(),
            [
                PathBuf::from("/dev/input/event0"),
                PathBuf::from("/dev/input/event1")
            ]
        );
        assert_eq!(opener.output_opens.borrow().len(), 4);
        assert_eq!(reg.inputs().len(), 2);
        assert_eq!(reg.table().len(), 4);
    }

    #[test]
    fn open_interleaves_input_before_its_first_output() {
        let opener = MockOpener::new();
        let decls = [
            decl("A", "caps_lock", "/dev/input/event0", "/leds/a"),
            decl("B", "caps_lock", "/dev/input/event1", "/leds/b"),
        ];
        let _reg = resolve(&decls, &opener).unwrap();
        assert_eq!(
            *opener.output_opens.borrow(),
            [
                PathBuf::from("/leds/a/brightness"),
                PathBuf::from("/leds/b/brightness")
            ]
        );
    }

    #[test]
    fn open_builds_fan_out() {
        let opener = MockOpener::new();
        let decls = [
            decl("A", "caps_lock", "/dev/input/event0", "/leds/a"),
            decl("B", "caps_lock", "/dev/input/event1", "/leds/b"),
            decl("C", "num_lock", "/dev/input/event0", "/leds/c"),
        ];
        let reg = resolve(&decls, &opener).unwrap();
        assert_eq!(reg.inputs()[0].fan_out, [OutputId(0), OutputId(2)]);
        assert_eq!(reg.inputs()[1].fan_out, [OutputId(1)]);
        assert_eq!(reg.output(OutputId(2)).path(), Path::new("/leds/c/brightness"));
    }

    #[test]
    fn config_errors_open_nothing() {
        let opener = MockOpener::new();
        let decls = [
            decl("A", "caps_lock", "/dev/input/event0", "/leds/a"),
            decl("B", "num_lock", "/dev/input/event1", "/leds/a"),
        ];
        let err = match resolve(&decls, &opener) {
            Err(e) => e,
            Ok(_) => panic!("resolve should fail"),
        };
        assert!(matches!(
            err,
            KeyleddError::Binding(BindingError::OutputAlreadyBound { .. })
        ));
        assert!(opener.input_opens.borrow().is_empty());
        assert!(opener.output_opens.borrow().is_empty());
    }

    #[test]
    fn open_failure_names_path() {
        let opener = MockOpener::new();
        opener.make_missing("/leds/b/brightness");
        let decls = [
            decl("A", "caps_lock", "/dev/input/event0", "/leds/a"),
            decl("B", "num_lock", "/dev/input/event0", "/leds/b"),
        ];
        let err = match resolve(&decls, &opener) {
            Err(e) => e,
            Ok(_) => panic!("resolve should fail"),
        };
        assert!(err.to_string().contains("/leds/b/brightness"), "{err}");
    }

    #[test]
    fn display_messages_name_both_bindings() {
        let e = BindingError::OutputAlreadyBound {
            binding: "second".into(),
            existing: "first".into(),
            output: "/leds/x/brightness".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("second") && msg.contains("first"), "{msg}");
        assert_eq!(BindingError::NoBindingsDefined.to_string(), "no LED bindings defined");
    }
}
