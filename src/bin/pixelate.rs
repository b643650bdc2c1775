//! Command-line interface for painting-pixelator
//!
//! Usage: pixelate [OPTIONS] <INPUT> <OUTPUT>

use painting_pixelator::prelude::*;
use std::error::Error;
use std::path::PathBuf;

fn parse_or_exit<T: std::str::FromStr>(value: Option<&String>, what: &str) -> T {
    match value.and_then(|v| v.parse().ok()) {
        Some(v) => v,
        None => {
            eprintln!("Invalid {}", what);
            std::process::exit(1);
        }
    }
}

fn parse_pair(value: Option<&String>, sep: char, what: &str) -> (String, String) {
    match value.and_then(|v| v.split_once(sep)) {
        Some((a, b)) => (a.to_string(), b.to_string()),
        None => {
            eprintln!("Invalid {}, expected A{}B", what, sep);
            std::process::exit(1);
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 3 {
        print_usage(&args[0]);
        std::process::exit(1);
    }

    let mut input_path = None;
    let mut output_path = None;
    let mut config_path: Option<PathBuf> = None;
    let mut name: Option<String> = None;
    let mut tiles: Option<(u32, u32)> = None;
    let mut resolution: Option<u32> = None;
    let mut colors: Option<u32> = None;
    let mut dither: Option<f64> = None;
    let mut zoom: Option<f64> = None;
    let mut offset: Option<(f64, f64)> = None;
    let mut pixel_art = false;
    let mut upload = true;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-t" | "--tiles" => {
                i += 1;
                let (w, h) = parse_pair(args.get(i), 'x', "tile grid");
                tiles = Some((parse_or_exit(Some(&w), "tiles wide"), parse_or_exit(Some(&h), "tiles high")));
            }
            "-r" | "--resolution" => {
                i += 1;
                resolution = Some(parse_or_exit(args.get(i), "tile resolution"));
            }
            "-c" | "--colors" => {
                i += 1;
                colors = Some(parse_or_exit(args.get(i), "color count"));
            }
            "-d" | "--dither" => {
                i += 1;
                dither = Some(parse_or_exit(args.get(i), "dither strength"));
            }
            "-z" | "--zoom" => {
                i += 1;
                zoom = Some(parse_or_exit(args.get(i), "zoom"));
            }
            "-o" | "--offset" => {
                i += 1;
                let (x, y) = parse_pair(args.get(i), ',', "offset");
                offset = Some((parse_or_exit(Some(&x), "offset x"), parse_or_exit(Some(&y), "offset y")));
            }
            "-n" | "--name" => {
                i += 1;
                name = args.get(i).cloned();
            }
            "--config" => {
                i += 1;
                config_path = args.get(i).map(PathBuf::from);
            }
            "--pixel-art" => {
                pixel_art = true;
            }
            "--no-upload" => {
                upload = false;
            }
            "--help" => {
                print_usage(&args[0]);
                std::process::exit(0);
            }
            arg if !arg.starts_with('-') => {
                if input_path.is_none() {
                    input_path = Some(PathBuf::from(arg));
                } else if output_path.is_none() {
                    output_path = Some(PathBuf::from(arg));
                }
            }
            _ => {
                eprintln!("Unknown option: {}", args[i]);
                std::process::exit(1);
            }
        }
        i += 1;
    }

    let (Some(input_path), Some(output_path)) = (input_path, output_path) else {
        print_usage(&args[0]);
        std::process::exit(1);
    };

    let config = match &config_path {
        Some(path) => Config::from_json_str(&std::fs::read_to_string(path)?)?,
        None => Config::default(),
    };

    println!("Loading {}...", input_path.display());
    let source = RawImage::decode(&std::fs::read(&input_path)?)?;
    let name = name.unwrap_or_else(|| {
        input_path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default()
    });

    // Step 1: Derived defaults, then explicit overrides
    let mut session = EditingSession::new(source, name, config.pixelator.clone());
    session.update(|p| {
        if let Some(r) = resolution { p.tile_resolution = r; }
        if let Some(c) = colors { p.color_count = c; }
        if let Some(d) = dither { p.dither_strength = d; }
        if let Some(z) = zoom { p.zoom = z; }
        if let Some((x, y)) = offset {
            p.offset_x = x;
            p.offset_y = y;
        }
        p.pixel_art_mode = pixel_art;
    });
    // Explicit tile counts win over the pixel-art refit
    if let Some((w, h)) = tiles {
        session.update(|p| {
            p.tiles_wide = w;
            p.tiles_high = h;
        });
    }
    let params = session.parameters().clone();
    println!(
        "Pixelating {}x{} -> {}x{} tiles of {}px, {} colors{}",
        session.source().width(),
        session.source().height(),
        params.tiles_wide,
        params.tiles_high,
        params.tile_resolution,
        params.color_count,
        if params.pixel_art_mode { " (pixel art)" } else { "" }
    );

    // Step 2: Pipeline
    let start = std::time::Instant::now();
    let output = session.output()?.clone();
    println!("Pixelation completed in {:?}", start.elapsed());
    println!("Output: {} distinct colors", output.distinct_colors());

    output.to_image().save(&output_path)?;
    println!("Saved to {}", output_path.display());

    // Step 3: Round-trip the upload through an in-memory registry
    if upload {
        let messages = upload_messages(&output, &params, session.name(), &config.transfer)?;
        let mut receiver = UploadReceiver::new(MemoryRegistry::new(), config.transfer.clone());
        let sent = messages.len();
        let mut committed = None;
        for message in messages {
            let wire = message.to_json()?;
            if let CommitOutcome::Committed(id) = receiver.handle_json(&wire)? {
                committed = Some(id);
            }
        }
        match committed {
            Some(id) => println!("Upload: {} messages, committed as {}", sent, id),
            None => println!("Upload: {} messages, nothing committed", sent),
        }
    }

    Ok(())
}

fn print_usage(program: &str) {
    eprintln!(
        r#"Painting Pixelator

Usage: {} [OPTIONS] <INPUT> <OUTPUT>

Options:
  -t, --tiles <WxH>             Tile grid, 1-16 each (default: derived from aspect)
  -r, --resolution <PX>         Pixels per tile edge: 16, 32, 64, 128 (default: 32)
  -c, --colors <N>              Palette size 1-25, 1 disables (default: 10)
  -d, --dither <S>              Dither strength 0-1 (default: 0.25)
  -z, --zoom <Z>                Extra zoom >= 1 (default: 1)
  -o, --offset <X,Y>            Crop origin fractions 0-1 (default: 0.5,0.5)
  -n, --name <NAME>             Painting name (default: input file stem)
  --pixel-art                   Sample on the detected source grid
  --config <FILE>               JSON config (pixelator / transfer sections)
  --no-upload                   Skip the simulated chunked upload
  --help                        Show this help message
"#, program);
}
