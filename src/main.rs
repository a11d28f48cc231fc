mod stream;

use std::path::PathBuf;
use std::process::exit;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use host1x_core::{
    ClassId, ContextId, Device, Host1xDevice, SyncConfig, SynchronizationManager,
    DEFAULT_CONTEXT, MAX_HARDWARE_SYNCPOINTS,
};

use stream::StreamError;

#[derive(Parser, Debug)]
#[command(
    name = "host1x",
    about = "Run Host1x command streams and trace the method calls they reach."
)]
struct Args {
    /// Command stream files, submitted in the given order
    #[arg(required = true, value_name = "STREAM")]
    streams: Vec<PathBuf>,

    /// Register a tracing device for this class (`0x` prefixed hex or decimal)
    #[arg(long = "class", value_name = "ID", value_parser = stream::parse_class_id)]
    classes: Vec<ClassId>,

    /// Streams are text files of hex words instead of raw little endian words
    #[arg(long, action = clap::ArgAction::SetTrue)]
    hex: bool,

    /// Channel context the streams are submitted under
    #[arg(long, value_name = "N", default_value_t = DEFAULT_CONTEXT)]
    context: ContextId,

    /// Number of syncpoints in the bank
    #[arg(long, value_name = "N", default_value_t = MAX_HARDWARE_SYNCPOINTS)]
    syncpoints: u32,

    /// Give up on waits without a timeout after this many milliseconds
    #[arg(long, value_name = "MS", default_value_t = 1000)]
    wait_fallback_ms: u64,
}

/// Prints every method call the class receives.
struct TraceDevice {
    class_id: ClassId,
    context_id: ContextId,
}

impl Device for TraceDevice {
    fn read(&mut self, _offset: u32) -> u32 {
        0
    }

    fn write(&mut self, offset: u32, data: u32) {
        println!(
            "{} [ctx {}] method {:#06x} = {:08X}",
            self.class_id, self.context_id, offset, data
        );
    }

    fn bind_context(&mut self, context_id: ContextId) {
        log::debug!("{}: bound context {}", self.class_id, context_id);
        self.context_id = context_id;
    }
}

fn run(args: Args) -> Result<(), StreamError> {
    // load everything before any worker starts
    let streams = args
        .streams
        .iter()
        .map(|path| stream::load(path, args.hex))
        .collect::<Result<Vec<_>, _>>()?;

    let mut classes = vec![ClassId::HOST1X];
    for &class_id in &args.classes {
        if classes.contains(&class_id) {
            return Err(StreamError::ClassAlreadyRegistered(class_id));
        }
        classes.push(class_id);
    }

    let sync_manager = Arc::new(SynchronizationManager::with_config(SyncConfig {
        syncpoint_count: args.syncpoints,
        infinite_wait_fallback: Duration::from_millis(args.wait_fallback_ms),
    }));
    let mut host1x = Host1xDevice::new(sync_manager.clone());

    for &class_id in &args.classes {
        host1x.register_device(
            class_id,
            TraceDevice {
                class_id,
                context_id: DEFAULT_CONTEXT,
            },
        );
    }

    for (path, words) in args.streams.iter().zip(&streams) {
        log::info!("submitting {} ({} words)", path.display(), words.len());
        host1x.submit_with_context(words, args.context);
    }
    host1x.dispose();

    for id in 0..sync_manager.syncpoint_count() {
        let value = sync_manager.value(id);
        if value != 0 {
            println!("syncpoint {:3}: {}", id, value);
        }
    }

    Ok(())
}

fn main() {
    env_logger::init();

    let args = Args::parse();
    if let Err(e) = run(args) {
        eprintln!("ERROR: {}", e);
        exit(1);
    }
}
