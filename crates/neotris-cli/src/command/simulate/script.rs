use anyhow::{Context, bail};
use neotris_engine::InputAction;

/// One instruction of a simulation script.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum ScriptStep {
    /// Queue an action and run one host frame.
    Input(InputAction),
    /// Let host time pass without input.
    Wait { ms: f64 },
    /// Push garbage rows in from the bottom, then run one host frame.
    Garbage { lines: usize },
}

/// Parses a script, one instruction per line.
///
/// ```text
/// # comments run to the end of the line
/// left 2        # action name or alias, optional repeat count
/// cw
/// hard
/// wait 500      # milliseconds
/// garbage 3
/// ```
pub(crate) fn parse(text: &str) -> anyhow::Result<Vec<ScriptStep>> {
    let mut steps = Vec::new();
    for (index, line) in text.lines().enumerate() {
        let line_no = index + 1;
        let content = line.split('#').next().unwrap_or_default();
        let mut tokens = content.split_whitespace();
        let Some(keyword) = tokens.next() else {
            continue;
        };
        let argument = tokens.next();
        if let Some(extra) = tokens.next() {
            bail!("line {line_no}: unexpected {extra:?}");
        }

        match keyword {
            "wait" => {
                let ms: f64 = required(argument, line_no, "wait")?
                    .parse()
                    .with_context(|| format!("line {line_no}: invalid wait duration"))?;
                if !(ms >= 0.0 && ms.is_finite()) {
                    bail!("line {line_no}: wait duration must be a non-negative number");
                }
                steps.push(ScriptStep::Wait { ms });
            }
            "garbage" => {
                let lines = required(argument, line_no, "garbage")?
                    .parse()
                    .with_context(|| format!("line {line_no}: invalid garbage line count"))?;
                steps.push(ScriptStep::Garbage { lines });
            }
            action => {
                let action: InputAction = action
                    .parse()
                    .with_context(|| format!("line {line_no}"))?;
                let count: usize = argument
                    .map(str::parse)
                    .transpose()
                    .with_context(|| format!("line {line_no}: invalid repeat count"))?
                    .unwrap_or(1);
                steps.extend(std::iter::repeat_n(ScriptStep::Input(action), count));
            }
        }
    }
    Ok(steps)
}

fn required<'a>(argument: Option<&'a str>, line_no: usize, keyword: &str) -> anyhow::Result<&'a str> {
    argument.with_context(|| format!("line {line_no}: `{keyword}` needs an argument"))
}
