//! Terminal implementations of the engine's interactive collaborators.

use std::io::{self, BufRead, Write};
use std::path::Path;
use std::process::Command;

use futures::future::BoxFuture;
use stowage_core::{CollisionDecision, ItemReference};
use stowage_ops::{
    Confirmation, ConfirmationDialog, ConflictDialog, ConflictPrompt, ConflictResponse,
    DeleteChoice, DeletePrompt, ExecutableLauncher, Notice, Prompt, ResolvedItem,
};

/// Prompts on stdin/stderr, or answers everything with the defaults when
/// `assume_yes` is set.
#[derive(Debug, Clone, Copy)]
pub struct TerminalDialogs {
    assume_yes: bool,
}

impl TerminalDialogs {
    pub fn new(assume_yes: bool) -> Self {
        Self { assume_yes }
    }
}

/// Print `question` and read one trimmed, lowercased line.
///
/// End of input counts as an empty answer.
async fn ask(question: String) -> String {
    tokio::task::spawn_blocking(move || {
        let mut stderr = io::stderr();
        let _ = write!(stderr, "{question} ");
        let _ = stderr.flush();

        let mut line = String::new();
        match io::stdin().lock().read_line(&mut line) {
            Ok(_) => line.trim().to_lowercase(),
            Err(_) => String::new(),
        }
    })
    .await
    .unwrap_or_default()
}

async fn ask_yes_no(question: String) -> bool {
    matches!(ask(format!("{question} [y/N]")).await.as_str(), "y" | "yes")
}

impl ConflictDialog for TerminalDialogs {
    fn resolve<'a>(&'a self, prompt: ConflictPrompt) -> BoxFuture<'a, ConflictResponse> {
        Box::pin(async move {
            let decision = if self.assume_yes {
                None
            } else {
                eprintln!(
                    "{}: {} item(s) already exist:",
                    prompt.operation,
                    prompt.conflicting().count()
                );
                for item in prompt.conflicting() {
                    eprintln!("  {}", item.destination.display());
                }
                let answer = ask("[k]eep both / [r]eplace / [s]kip / [c]ancel?".to_string()).await;
                match answer.as_str() {
                    "r" | "replace" => Some(CollisionDecision::ReplaceExisting),
                    "s" | "skip" => Some(CollisionDecision::Skip),
                    "k" | "keep" | "" => Some(CollisionDecision::GenerateNewName),
                    _ => return ConflictResponse::cancel(),
                }
            };

            let items = prompt
                .items
                .into_iter()
                .map(|item| ResolvedItem {
                    decision: match decision {
                        Some(chosen) if item.conflicting => chosen,
                        _ => item.decision,
                    },
                    source: item.source,
                    custom_name: None,
                })
                .collect();
            ConflictResponse {
                cancelled: false,
                items,
            }
        })
    }
}

impl ConfirmationDialog for TerminalDialogs {
    fn confirm_delete<'a>(&'a self, prompt: DeletePrompt) -> BoxFuture<'a, DeleteChoice> {
        Box::pin(async move {
            if self.assume_yes {
                return DeleteChoice::Proceed {
                    permanently: prompt.permanently,
                };
            }

            for item in &prompt.items {
                eprintln!("  {}", item.display_name);
            }
            let how = if prompt.permanently {
                "permanently delete"
            } else {
                "move to trash"
            };
            if ask_yes_no(format!("{} {} item(s)?", how, prompt.items.len())).await {
                DeleteChoice::Proceed {
                    permanently: prompt.permanently,
                }
            } else {
                DeleteChoice::Cancel
            }
        })
    }

    fn confirm<'a>(&'a self, prompt: Prompt) -> BoxFuture<'a, Confirmation> {
        Box::pin(async move {
            if self.assume_yes {
                return Confirmation::Primary;
            }

            let question = match prompt {
                Prompt::ChangeExtension { name, .. } => {
                    format!("Changing the extension may make '{name}' unusable. Continue?")
                }
                Prompt::ShortcutFailed { name, fallback } => match fallback {
                    Some(dir) => format!(
                        "Could not create a shortcut to '{}'. Create it in {} instead?",
                        name,
                        dir.display()
                    ),
                    None => format!("Could not create a shortcut to '{name}'. Continue?"),
                },
            };
            if ask_yes_no(question).await {
                Confirmation::Primary
            } else {
                Confirmation::Secondary
            }
        })
    }

    fn notify<'a>(&'a self, notice: Notice) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            match notice {
                Notice::InvalidName { name } => eprintln!("'{name}' is not a valid name"),
                Notice::AccessDenied { operation } => {
                    eprintln!("{operation}: access denied for one or more items")
                }
                Notice::Unexpected { operation, status } => {
                    eprintln!("{operation}: unexpected error ({status})")
                }
            }
        })
    }
}

/// Launches an executable with the dropped items as arguments.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessLauncher;

impl ExecutableLauncher for ProcessLauncher {
    fn open_with<'a>(
        &'a self,
        executable: &'a Path,
        items: &'a [ItemReference],
    ) -> BoxFuture<'a, io::Result<()>> {
        Box::pin(async move {
            Command::new(executable)
                .args(items.iter().filter(|i| i.has_path()).map(|i| &i.path))
                .spawn()
                .map(|_| ())
        })
    }
}
