/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::{
    fmt, io,
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc::{channel, Receiver, Sender},
        Arc, Mutex,
    },
    thread::{self, JoinHandle},
};

use anyhow::{anyhow, bail, Context, Result};
use chess::{Board, ChessMove};
use clap::Parser;
use uci_parser::{UciCommand, UciInfo, UciOption, UciParseError, UciResponse, UciSearchOptions};

use crate::{
    parse_uci_move, pretty, BoardExt, EngineCommand, EngineOptions, Evaluator, KillerTable,
    LogDebug, LogInfo, LogLevel, Search, SearchConfig, SearchResult, TTable,
};

/// The engine host: owns the game state, the hash tables, and the threads
/// that feed commands to the search.
#[derive(Debug)]
pub struct Engine {
    /// The current state of the chess board, as known to the engine.
    ///
    /// This is modified whenever moves are played or new positions are given,
    /// and is reset whenever the engine is told to start a new game.
    game: Board,

    /// All previous positions of `self.game`, oldest first.
    ///
    /// Its length is the game ply of the current position.
    prev_positions: Vec<Board>,

    /// Startup flags controlling search heuristics and time management.
    options: EngineOptions,

    /// One half of a channel, responsible for sending commands to the engine to execute.
    sender: Sender<EngineCommand>,

    /// One half of a channel, responsible for receiving commands for the engine to execute.
    receiver: Receiver<EngineCommand>,

    /// Atomic flag to determine whether a search is currently running.
    is_searching: Arc<AtomicBool>,

    /// Handle to the currently-running search thread, if one exists.
    search_thread: Option<JoinHandle<SearchResult>>,

    /// Transposition table used to cache information found during search.
    ttable: Arc<Mutex<TTable>>,

    /// Killer-move table shared with the search.
    killers: Arc<Mutex<KillerTable>>,

    /// Whether to display extra information during execution.
    debug: bool,
}

impl Engine {
    /// Constructs a new [`Engine`] instance to be executed with [`Engine::run`].
    pub fn new(options: EngineOptions) -> Result<Self> {
        let (sender, receiver) = channel();

        let game = match options.fen.as_deref() {
            Some(fen) => fen
                .parse()
                .map_err(|e| anyhow!("Invalid FEN {fen:?}: {e}"))?,
            None => Board::default(),
        };

        let ttable = Arc::new(Mutex::new(TTable::from_capacity(options.cache_size)));

        Ok(Self {
            game,
            prev_positions: Vec::with_capacity(512),
            options,
            sender,
            receiver,
            is_searching: Arc::default(),
            search_thread: None,
            ttable,
            killers: Arc::default(),
            debug: false,
        })
    }

    /// Returns a string of the engine's name and current version.
    #[inline(always)]
    pub fn name(&self) -> String {
        format!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
    }

    /// Returns a string of all authors of this engine.
    #[inline(always)]
    pub fn authors(&self) -> String {
        // Split multiple authors by comma-space
        let authors = env!("CARGO_PKG_AUTHORS").replace(':', ", ");
        if authors.is_empty() {
            String::from("anonymous")
        } else {
            authors
        }
    }

    /// Sends an [`EngineCommand`] to the engine to be executed.
    #[inline(always)]
    pub fn send_command(&self, command: EngineCommand) {
        // Safe unwrap: the corresponding receiver lives as long as the engine itself.
        self.sender
            .send(command)
            .expect("Failed to send a command to the engine via channels.");
    }

    /// Entrypoint of the engine.
    ///
    /// Spawns a thread to handle input from `stdin`, then loops on commands
    /// received over the channel, executing them in order.
    pub fn run(&mut self) -> Result<()> {
        println!("{} by {}", self.name(), self.authors());

        // Spawn a separate thread for handling user input
        let sender = self.sender.clone();
        thread::spawn(|| {
            if let Err(err) = input_handler(sender) {
                eprintln!("Input handler thread stopping after fatal error: {err:#}");
            }
        });

        // Execute commands as they are received
        while let Ok(cmd) = self.receiver.recv() {
            match cmd {
                EngineCommand::Display => println!("{}", pretty(&self.game)),

                EngineCommand::Eval => println!("{}", Evaluator::new(&self.game).eval()),

                EngineCommand::Exit { cleanup } => {
                    // If requested, await the completion of any ongoing search threads
                    if cleanup {
                        self.stop_search();
                    }

                    break;
                }

                EngineCommand::Fen => println!("{}", self.game),

                EngineCommand::HashInfo => self.hash_info(),

                EngineCommand::MakeMove { mv_string } => {
                    match parse_uci_move(&self.game, &mv_string) {
                        Ok(mv) => self.make_move(mv),
                        Err(e) => eprintln!("{e:#}"),
                    }
                }

                EngineCommand::Moves => self.moves(),

                EngineCommand::Uci { cmd } => {
                    // UCI spec states to continue execution if an error occurs
                    if let Err(e) = self.handle_uci_command(cmd) {
                        eprintln!("Error: {e:#}");
                    }
                }
            }
        }

        Ok(())
    }

    /// Handle the execution of a single [`UciCommand`].
    fn handle_uci_command(&mut self, uci: UciCommand) -> Result<()> {
        use UciCommand::*;
        match uci {
            Uci => self.uci(),

            Debug(status) => self.debug = status,

            IsReady => println!("{}", UciResponse::<&str>::ReadyOk),

            SetOption { name, value } => self.set_option(&name, value)?,

            Register { name: _, code: _ } => println!("{} requires no registration", self.name()),

            UciNewGame => self.new_game(),

            Go(options) => self.go(options),

            Position { fen, moves } => self.position(fen, moves)?,

            Stop => self.set_is_searching(false),

            Quit => self.send_command(EngineCommand::Exit { cleanup: false }),

            _ => bail!("{} does not support UCI command {uci:?}", self.name()),
        }

        Ok(())
    }

    /// Handles the `go` command: computes a time budget and spawns a search.
    fn go(&mut self, options: UciSearchOptions) {
        // Mate and stalemate are decided before any search begins.
        if self.game.legal_moves().is_empty() {
            Self::send_string("No legal moves in the current position");
            println!(
                "{}",
                UciResponse::<String>::BestMove {
                    bestmove: None,
                    ponder: None,
                }
            );
            return;
        }

        let config = SearchConfig::new(
            options,
            &self.game,
            &self.options,
            self.prev_positions.len(),
        );

        self.search_thread = if self.debug {
            self.start_search::<LogDebug>(config)
        } else {
            self.start_search::<LogInfo>(config)
        };
    }

    /// Set the position to the supplied FEN string (defaults to the standard
    /// start position if not supplied), then apply `moves` one-by-one.
    fn position(&mut self, fen: Option<String>, moves: Vec<String>) -> Result<()> {
        let mut game: Board = match fen {
            Some(fen) => fen
                .parse()
                .map_err(|e| anyhow!("Invalid FEN {fen:?}: {e}"))?,
            None => Board::default(),
        };

        // Since this is a new position, it has a new history
        self.prev_positions.clear();

        for mv_str in moves {
            let mv = parse_uci_move(&game, &mv_str)?;
            self.prev_positions.push(game);
            game = game.make_move_new(mv);
        }

        self.game = game;
        Ok(())
    }

    /// Applies `mv` to the current position.
    #[inline(always)]
    fn make_move(&mut self, mv: ChessMove) {
        self.prev_positions.push(self.game);
        self.game = self.game.make_move_new(mv);
    }

    /// Executes the `moves` command, listing all legal moves on the board.
    fn moves(&self) {
        let moves = self.game.legal_moves();

        if moves.is_empty() {
            println!("(none)");
        } else {
            let string = moves
                .iter()
                .map(|mv| mv.to_string())
                .collect::<Vec<_>>()
                .join(", ");
            println!("{string}");
        }
    }

    /// Display info about the internal hash table(s)
    fn hash_info(&self) {
        let ttable = self.ttable();

        let size = ttable.size();
        let num = ttable.num_entries();
        let cap = ttable.capacity();
        let percent = num as f32 / cap as f32 * 100.0;
        println!("TT info: {size}mb @ {num}/{cap} entries ({percent:.2}% full)");
    }

    /// Clears all hash tables in the engine.
    ///
    /// Called in between games.
    #[inline(always)]
    fn clear_hash_tables(&mut self) {
        self.ttable().clear();
        self.killers().clear();
    }

    /// Resets the engine's internal game state.
    ///
    /// This clears all hash tables and search history, and cancels any
    /// ongoing search, ignoring its result.
    fn new_game(&mut self) {
        self.set_is_searching(false);
        self.prev_positions.clear();
        self.clear_hash_tables();
        self.game = Board::default();
    }

    /// Sets the search flag to signal that the engine is starting/stopping a search.
    #[inline(always)]
    fn set_is_searching(&mut self, status: bool) {
        self.is_searching.store(status, Ordering::Relaxed);
    }

    /// Returns `true` if the engine is currently executing a search.
    #[inline(always)]
    fn is_searching(&self) -> bool {
        self.is_searching.load(Ordering::Relaxed)
    }

    /// Starts a search on the current position, given the parameters in `config`.
    fn start_search<Log: LogLevel + Send + 'static>(
        &mut self,
        config: SearchConfig,
    ) -> Option<JoinHandle<SearchResult>> {
        // Cannot start a search if one is already running
        if self.is_searching() {
            Self::send_string("A search is already running");
            return None;
        }
        self.set_is_searching(true);

        // Clone the parameters that will be sent into the thread
        let game = self.game;
        let is_searching = Arc::clone(&self.is_searching);
        let ttable = Arc::clone(&self.ttable);
        let killers = Arc::clone(&self.killers);

        // Spawn a thread to conduct the search
        let handle = thread::spawn(move || {
            // Lock the hash tables for the duration of the search so that
            // only the search thread may modify them
            let mut ttable = ttable
                .lock()
                .expect("Failed to acquire Transposition Table at the start of search.");
            let mut killers = killers
                .lock()
                .expect("Failed to acquire Killer Table at the start of search.");

            // Start the search, returning the result when completed.
            Search::<Log>::new(is_searching, config, &mut ttable, &mut killers).start(&game)
        });

        Some(handle)
    }

    /// Awaits the current search thread, blocking until it finishes and returning its result.
    fn stop_search(&mut self) -> Option<SearchResult> {
        // Can't stop a search if there aren't any threads searching!
        let handle = self.search_thread.take()?;

        // Attempt to join the thread handle to retrieve the result
        let id = handle.thread().id();
        let Ok(res) = handle.join() else {
            Self::send_string(format!("Failed to join on thread {id:?}"));
            return None;
        };

        // Flip the search flag so that any active threads will begin to clean themselves up.
        self.set_is_searching(false);

        Some(res)
    }

    /// Called when the engine receives the `uci` command.
    ///
    /// Prints engine's ID, version, and authors, and lists all UCI options.
    fn uci(&self) {
        println!("id name {}\nid author {}\n", self.name(), self.authors());

        // Print all UCI options
        for opt in self.options() {
            println!("{}", UciResponse::Option(opt));
        }

        // We're ready to go!
        println!("{}", UciResponse::<&str>::UciOk)
    }

    /// Convenience function to return an iterator over all UCI options this engine supports.
    fn options(&self) -> impl Iterator<Item = UciOption> {
        [
            UciOption::button("Clear Hash".to_string()),
            UciOption::spin(
                "Hash".to_string(),
                TTable::DEFAULT_SIZE as i32,
                TTable::MIN_SIZE as i32,
                TTable::MAX_SIZE as i32,
            ),
            UciOption::spin("Threads".to_string(), 1, 1, 1),
        ]
        .into_iter()
    }

    /// Handles the `setoption` command, setting option `name` to `value`.
    ///
    /// Will return an error if `name` isn't a valid option or `value` is not
    /// a valid value for that option.
    fn set_option(&mut self, name: &str, value: Option<String>) -> Result<()> {
        match name {
            // Clear all hash tables
            "Clear Hash" => self.clear_hash_tables(),

            // Re-size the hash table
            "Hash" => {
                let Some(value) = value.as_ref() else {
                    bail!("usage: setoption name {name} value <value>");
                };

                let Ok(mb) = value.parse() else {
                    bail!("expected integer. got {value:?}");
                };

                // Ensure the value is within bounds
                if mb < TTable::MIN_SIZE {
                    bail!("Minimum value for Hash is {}mb", TTable::MIN_SIZE);
                }
                if mb > TTable::MAX_SIZE {
                    bail!("Maximum value for Hash is {}mb", TTable::MAX_SIZE);
                }

                *self.ttable() = TTable::new(mb);
            }

            // Set the number of search threads
            "Threads" => bail!("{} currently supports only 1 thread", self.name()),

            _ => {
                if let Some(value) = value.as_ref() {
                    bail!("Unrecognized option {name:?} with value {value:?}")
                } else {
                    bail!("Unrecognized option {name:?}")
                }
            }
        }

        if self.debug {
            let info = if let Some(value) = value.as_ref() {
                format!("Option {name} set to {value}")
            } else {
                format!("Option {name} toggled")
            };
            Self::send_string(info);
        }

        Ok(())
    }

    /// Helper to send a [`UciInfo`] containing only a `string` message to `stdout`.
    #[inline(always)]
    fn send_string<T: fmt::Display>(info: T) {
        let resp = UciResponse::<String>::Info(Box::new(UciInfo::new().string(info)));
        println!("{resp}");
    }

    /// Helper function to fetch the TTable, panicking if impossible.
    #[inline(always)]
    fn ttable(&self) -> std::sync::MutexGuard<'_, TTable> {
        self.ttable
            .lock()
            .expect("A thread holding the TTable panicked")
    }

    /// Helper function to fetch the Killer table, panicking if impossible.
    #[inline(always)]
    fn killers(&self) -> std::sync::MutexGuard<'_, KillerTable> {
        self.killers
            .lock()
            .expect("A thread holding the Killer table panicked")
    }
}

/// Loops endlessly to await input via `stdin`, sending all successfully-parsed
/// commands through the supplied `sender`.
fn input_handler(sender: Sender<EngineCommand>) -> Result<()> {
    let mut buffer = String::with_capacity(2048);

    loop {
        // Clear the buffer, read input, and trim the trailing newline
        buffer.clear();
        let bytes = io::stdin()
            .read_line(&mut buffer)
            .context("Failed to read line when parsing UCI commands")?;

        // For ctrl + d
        if 0 == bytes {
            // Send the Quit command and exit this function
            sender
                .send(EngineCommand::Exit { cleanup: false })
                .context("Failed to send 'quit' command after receiving empty input")?;

            bail!("Engine received input of 0 bytes and is quitting");
        }

        // Trim any leading/trailing whitespace
        let buf = buffer.trim();

        // Ignore empty lines
        if buf.is_empty() {
            continue;
        }

        // Attempt to parse the input as a UCI command first, since that's the
        // primary use case of the engine
        match UciCommand::new(buf) {
            Ok(cmd) => sender
                .send(EngineCommand::Uci { cmd })
                .context("Failed to send UCI command to engine")?,

            // If it's not a UCI command, check if it's an engine-specific command
            Err(UciParseError::UnrecognizedCommand { cmd: _ }) => {
                let args = shlex::split(buf).context("Invalid quoting")?;

                match EngineCommand::try_parse_from(args) {
                    Ok(cmd) => sender
                        .send(cmd)
                        .context("Failed to send command to engine")?,

                    // If it wasn't a custom command either, print an error.
                    Err(err) => eprintln!("{err}"),
                }
            }

            // If it was a malformed UCI command, print a usage message.
            Err(uci_err) => eprintln!("{uci_err:#}"),
        }
    }
}
