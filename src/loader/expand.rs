//! Defaults tree expansion.
//!
//! Expansion walks the defaults lists depth-first with an explicit worklist.
//! Each config is resolved (and recorded in the load history) when it is
//! reached, and its content is scheduled at the position of its `_self_`
//! marker. The result is a flat merge plan, kept separate from merging.

use crate::defaults::{DefaultElement, GroupChoice, normalize_path};
use crate::error::{CfgError, Result};
use crate::loader::framework::FRAMEWORK_CONFIG_NAME;
use crate::loader::types::LoadRecord;
use crate::node::{ConfigNode, Value};
use crate::overrides::{Override, OverrideOp};
use crate::sources::{ConfigRepository, ResolvedConfig};
use std::collections::HashSet;
use tracing::debug;

/// A config's own content, scheduled for merging at `package`.
#[derive(Debug, Clone)]
pub struct PlannedNode {
	pub config_path: String,
	pub package: String,
	pub node: ConfigNode,
}

/// Output of expansion: nodes in merge order and the final group choices.
#[derive(Debug, Clone, Default)]
pub struct Expansion {
	pub plan: Vec<PlannedNode>,
	/// Group path -> selected option (`null` when deselected).
	pub choices: ConfigNode,
}

enum Work {
	Resolve {
		element: DefaultElement,
		primary: bool,
	},
	Emit(PlannedNode),
}

struct GroupOverride {
	ov: Override,
	group: String,
	used: bool,
}

/// Expands the defaults tree of one composition.
pub struct Expander<'r, 'a> {
	repo: &'r ConfigRepository<'a>,
	overrides: Vec<GroupOverride>,
	visited: HashSet<String>,
	choices: ConfigNode,
}

impl<'r, 'a> Expander<'r, 'a> {
	/// `group_overrides` must only hold overrides whose key names a config group.
	pub fn new(repo: &'r ConfigRepository<'a>, group_overrides: Vec<Override>) -> Self {
		let overrides = group_overrides
			.into_iter()
			.map(|ov| GroupOverride {
				group: ov.group_path(),
				ov,
				used: false,
			})
			.collect();
		Self {
			repo,
			overrides,
			visited: HashSet::new(),
			choices: ConfigNode::new(),
		}
	}

	/// Expand the framework config followed by `primary`.
	///
	/// Every resolved config is appended to `history` as soon as it is found,
	/// so a failed expansion still shows how far composition got.
	pub fn expand(mut self, primary: Option<&str>, history: &mut Vec<LoadRecord>) -> Result<Expansion> {
		let mut roots = vec![Work::Resolve {
			element: DefaultElement::config(FRAMEWORK_CONFIG_NAME).optional(),
			primary: false,
		}];
		match primary {
			Some(name) => roots.push(Work::Resolve {
				element: DefaultElement::config(name),
				primary: true,
			}),
			None => {
				for element in self.appended_groups(&[])? {
					roots.push(Work::Resolve {
						element,
						primary: false,
					});
				}
			}
		}

		let mut stack: Vec<Work> = roots.into_iter().rev().collect();
		let mut plan = Vec::new();
		while let Some(work) = stack.pop() {
			match work {
				Work::Emit(planned) => plan.push(planned),
				Work::Resolve { element, primary } => {
					let Some(resolved) = self.resolve(&element)? else {
						continue;
					};
					debug!(record = %resolved.record, "resolved config");
					history.push(resolved.record.clone());
					let children = self.children(resolved, primary)?;
					stack.extend(children.into_iter().rev());
				}
			}
		}

		self.check_unused()?;
		Ok(Expansion {
			plan,
			choices: self.choices,
		})
	}

	/// Resolve one defaults element, or `None` when it contributes nothing.
	fn resolve(&mut self, element: &DefaultElement) -> Result<Option<ResolvedConfig>> {
		let (config_path, optional) = match element {
			DefaultElement::SelfRef => return Ok(None),
			DefaultElement::Config { path, optional } => (path.clone(), *optional),
			DefaultElement::Group {
				group,
				choice,
				optional,
			} => {
				let Some(choice) = self.overridden_choice(group, choice)? else {
					debug!(group = %group, "group removed by override");
					return Ok(None);
				};
				match choice {
					GroupChoice::Deselected => {
						self.choices.insert(group.clone(), Value::Null);
						return Ok(None);
					}
					GroupChoice::Mandatory => {
						return Err(CfgError::MissingGroupChoice {
							group: group.clone(),
						});
					}
					GroupChoice::Option(option) => {
						self.choices.insert(group.clone(), option.as_str());
						(format!("{group}/{option}"), *optional)
					}
				}
			}
		};

		if !self.visited.insert(config_path.clone()) {
			return Err(CfgError::DuplicateDefault {
				config: config_path,
			});
		}
		self.repo.load(&config_path, !optional)
	}

	/// The worklist items a resolved config expands into, in merge order.
	fn children(&mut self, resolved: ResolvedConfig, primary: bool) -> Result<Vec<Work>> {
		let mut defaults = resolved.defaults;
		if primary {
			let appended = self.appended_groups(&defaults)?;
			defaults.extend(appended);
		}

		let config_path = resolved.config_path;
		let mut own = Some(Work::Emit(PlannedNode {
			config_path: config_path.clone(),
			package: resolved.package,
			node: resolved.node,
		}));

		let mut items = Vec::with_capacity(defaults.len() + 1);
		if !defaults.contains(&DefaultElement::SelfRef) {
			items.extend(own.take());
		}
		for element in defaults {
			if element == DefaultElement::SelfRef {
				let emit = own.take().ok_or_else(|| CfgError::InvalidDefaults {
					config: config_path.clone(),
					message: "'_self_' appears more than once".to_string(),
				})?;
				items.push(emit);
			} else {
				items.push(Work::Resolve {
					element,
					primary: false,
				});
			}
		}
		Ok(items)
	}

	/// Group elements requested with `+group=option`.
	fn appended_groups(&mut self, existing: &[DefaultElement]) -> Result<Vec<DefaultElement>> {
		let mut appended = Vec::new();
		for entry in self.overrides.iter_mut() {
			if entry.ov.op != OverrideOp::ForceAdd {
				continue;
			}
			if existing
				.iter()
				.any(|e| e.group_name() == Some(entry.group.as_str()))
			{
				return Err(override_error(
					&entry.ov,
					format!(
						"'{}' is already in the defaults list, use {}=<OPTION> to change it",
						entry.group, entry.ov.key
					),
				));
			}
			entry.used = true;
			appended.push(DefaultElement::Group {
				group: entry.group.clone(),
				choice: choice_from_override(&entry.ov)?,
				optional: false,
			});
		}
		Ok(appended)
	}

	/// Apply `group=option` and `~group` overrides to a group's declared choice.
	///
	/// Returns `None` when the group was removed.
	fn overridden_choice(&mut self, group: &str, declared: &GroupChoice) -> Result<Option<GroupChoice>> {
		let mut choice = Some(declared.clone());
		for entry in self.overrides.iter_mut() {
			if entry.group != group {
				continue;
			}
			match entry.ov.op {
				OverrideOp::Set => {
					entry.used = true;
					choice = Some(choice_from_override(&entry.ov)?);
				}
				OverrideOp::Delete => {
					entry.used = true;
					if let (Some(expected), Some(current)) = (&entry.ov.value, &choice) {
						let expected = choice_from_value(&entry.ov, expected)?;
						if expected != *current {
							return Err(override_error(
								&entry.ov,
								format!("'{group}' is set to {current}, not {expected}"),
							));
						}
					}
					choice = None;
				}
				OverrideOp::ForceAdd => {}
			}
		}
		Ok(choice)
	}

	fn check_unused(&self) -> Result<()> {
		match self.overrides.iter().find(|entry| !entry.used) {
			Some(entry) => Err(override_error(
				&entry.ov,
				format!("no match for '{}' in the defaults list", entry.group),
			)),
			None => Ok(()),
		}
	}
}

fn choice_from_override(ov: &Override) -> Result<GroupChoice> {
	match &ov.value {
		Some(value) => choice_from_value(ov, value),
		None => Err(override_error(ov, "missing group option")),
	}
}

fn choice_from_value(ov: &Override, value: &Value) -> Result<GroupChoice> {
	match value {
		Value::Str(option) => Ok(GroupChoice::Option(normalize_path(option))),
		Value::Null => Ok(GroupChoice::Deselected),
		Value::Missing => Ok(GroupChoice::Mandatory),
		Value::Bool(_) | Value::Int(_) | Value::Float(_) => {
			Ok(GroupChoice::Option(value.to_string()))
		}
		Value::Seq(_) | Value::Map(_) => Err(override_error(
			ov,
			format!("group option must be a scalar, found {}", value.kind()),
		)),
	}
}

fn override_error(ov: &Override, message: impl Into<String>) -> CfgError {
	CfgError::OverrideApply {
		token: ov.input.clone(),
		message: message.into(),
	}
}
