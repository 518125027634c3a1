//! Two simulated peers editing one document.
//!
//! Each peer has its own shared text, buffer, view and awareness, joined by
//! a `TextBinding`. Every round one peer makes a random edit and moves its
//! selection, then updates and presence states are exchanged the way a
//! network provider would carry them. At the end both buffers must match.

use std::path::PathBuf;
use std::rc::Rc;

use clap::Parser;
use loom_editor_core::{
    BufferModel, EditOperation, EditorView, HeadlessView, Position, Range, RopeModel, Selection,
    rgba_u32_to_css,
};
use loom_editor_crdt::{
    Awareness, BindingOptions, ClientId, Cursor, LoroSharedText, PresenceState, SharedText,
    TextBinding, UserInfo,
};
use miette::{IntoDiagnostic, Result, miette};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[derive(Parser)]
#[command(version, about = "Simulate two peers editing a shared document", long_about = None)]
struct Cli {
    /// Path to a JSON file with binding options
    #[arg(long)]
    options: Option<PathBuf>,

    /// Number of edit rounds
    #[arg(long, default_value_t = 20)]
    rounds: usize,

    /// Seed for the edit generator
    #[arg(long, default_value_t = 7)]
    seed: u64,

    /// Initial document content
    #[arg(long, default_value = "The quick brown fox\njumps over the lazy dog")]
    initial: String,
}

const WORDS: [&str; 6] = ["loom ", "weft ", "warp\n", "shuttle ", "heddle ", "bobbin "];

struct Peer {
    name: &'static str,
    text: Rc<LoroSharedText>,
    model: Rc<RopeModel>,
    view: Rc<HeadlessView>,
    awareness: Rc<Awareness<Cursor>>,
    _binding: TextBinding<LoroSharedText, RopeModel, Awareness<Cursor>>,
}

impl Peer {
    fn new(name: &'static str, client: ClientId, options: &BindingOptions) -> Result<Self> {
        let text = Rc::new(LoroSharedText::with_peer_id(client).into_diagnostic()?);
        let model = Rc::new(RopeModel::new());
        let view = Rc::new(HeadlessView::with_model(model.id()));
        let awareness = Rc::new(Awareness::new(client));
        awareness.set_local_user(UserInfo {
            name: name.into(),
            color: None,
        });

        let views: Vec<Rc<dyn EditorView>> = vec![view.clone()];
        let binding = TextBinding::attach(
            text.clone(),
            model.clone(),
            views,
            Some(awareness.clone()),
            options.clone(),
        );
        Ok(Self {
            name,
            text,
            model,
            view,
            awareness,
            _binding: binding,
        })
    }

    fn random_edit(&self, rng: &mut StdRng) -> Result<()> {
        let len = self.text.len();
        let edit = if len > 0 && rng.gen_bool(0.35) {
            let start = rng.gen_range(0..len);
            let end = (start + rng.gen_range(1..=6)).min(len);
            EditOperation::delete(Range::from_positions(
                self.model.position_at(start),
                self.model.position_at(end),
            ))
        } else {
            let at = self.model.position_at(rng.gen_range(0..=len));
            EditOperation::insert(at, WORDS[rng.gen_range(0..WORDS.len())])
        };
        tracing::debug!(peer = self.name, range = %edit.range, text = ?edit.text, "local edit");
        self.model.apply_edits(&[edit]).into_diagnostic()
    }

    fn random_selection(&self, rng: &mut StdRng) {
        let len = self.text.len();
        let anchor = self.model.position_at(rng.gen_range(0..=len));
        let head = self.model.position_at(rng.gen_range(0..=len));
        self.view.set_selection(Selection::from_positions(anchor, head));
    }

    /// Bring `other` up to date with this peer's document and presence.
    fn send_to(&self, other: &Peer) -> Result<()> {
        if let Some(updates) = self.text.export_updates_since(&other.text.version()) {
            tracing::debug!(from = self.name, to = other.name, bytes = updates.len(), "sync");
            other.text.import(&updates).into_diagnostic()?;
        }
        let state = self
            .awareness
            .local_state()
            .ok_or_else(|| miette!("{} has no local presence state", self.name))?;
        let wire = serde_json::to_string(&state).into_diagnostic()?;
        let state: PresenceState<Cursor> = serde_json::from_str(&wire).into_diagnostic()?;
        other
            .awareness
            .apply_remote_state(self.text.client_id(), state);
        Ok(())
    }

    fn report(&self) {
        println!("== {} ==", self.name);
        for line in self.model.value().lines() {
            println!("  | {line}");
        }
        if let Some(selection) = self.view.selection() {
            println!("  selection {selection}");
        }
        for decoration in self.view.decorations() {
            let color = decoration
                .options
                .color
                .map(rgba_u32_to_css)
                .unwrap_or_else(|| "none".to_string());
            println!(
                "  remote {} by {} ({color})",
                decoration.range,
                decoration.options.hover_message.as_deref().unwrap_or("?"),
            );
        }
    }
}

fn load_options(path: Option<&PathBuf>) -> Result<BindingOptions> {
    let Some(path) = path else {
        return Ok(BindingOptions::default());
    };
    let json = std::fs::read_to_string(path).into_diagnostic()?;
    BindingOptions::from_json(&json).into_diagnostic()
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let options = load_options(cli.options.as_ref())?;
    let mut rng = StdRng::seed_from_u64(cli.seed);

    let alice = Peer::new("alice", 1, &options)?;
    let bob = Peer::new("bob", 2, &options)?;

    alice
        .model
        .apply_edits(&[EditOperation::insert(Position::new(1, 1), cli.initial.as_str())])
        .into_diagnostic()?;
    alice.send_to(&bob)?;

    for round in 0..cli.rounds {
        let (from, to) = if rng.gen_bool(0.5) {
            (&alice, &bob)
        } else {
            (&bob, &alice)
        };
        from.random_edit(&mut rng)?;
        from.random_selection(&mut rng);
        // edits made before a sync arrives are concurrent
        if rng.gen_bool(0.3) {
            to.random_edit(&mut rng)?;
        }
        from.send_to(to)?;
        to.send_to(from)?;
        tracing::info!(round, len = alice.text.len(), "round complete");
    }

    alice.report();
    bob.report();

    if alice.model.value() != bob.model.value() {
        return Err(miette!("peers diverged"));
    }
    println!("peers converged on {} chars", alice.text.len());
    Ok(())
}
