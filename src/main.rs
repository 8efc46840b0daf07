//! ndpak
//!
//! Command-line front end for inspecting, exporting and rewriting
//! Naughty Dog PAK containers.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{debug, info, warn, Level};
use tracing_subscriber::{fmt, EnvFilter};

use ndpak_core::Game;
use ndpak_export::{BlockCodec, ImageFormat, JsonExporter, TextureWriter};
use ndpak_parsers::pak::dictionary::{dump_texture_hashes, TextureDictionary, TextureHashIndex};
use ndpak_parsers::{inject, InjectOptions, PakContainer, PakOptions, SceneBuilder, TextureRequest};

/// ndpak - Naughty Dog PAK inspector, exporter and mesh injector
#[derive(Parser)]
#[command(name = "ndpak")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose output (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Game title (U4, TLL, TLOU2, TLOUP1); detected from the path when omitted
    #[arg(long, global = true, value_parser = parse_game)]
    game: Option<Game>,

    /// Game root for base skeletons and texture dictionaries
    #[arg(long, global = true)]
    base_dir: Option<PathBuf>,

    /// Path to NDTextureHashes.json
    #[arg(long, global = true)]
    hash_index: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show header, pages, resources, meshes, bones and textures of a container
    Info(InfoArgs),

    /// Decode a container to the JSON scene format
    Export(ExportArgs),

    /// Write every resolvable texture to a folder
    Textures(TexturesArgs),

    /// Inject replacement geometry, bones or textures into a container
    Inject(InjectArgs),

    /// Build the texture hash index from a game install
    DumpHashes(DumpHashesArgs),
}

#[derive(Args)]
struct InfoArgs {
    /// Path to the .pak file
    pak: PathBuf,

    /// Print the summary as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct ExportArgs {
    /// Path to the .pak file
    pak: PathBuf,

    /// Output scene file
    #[arg(short, long, default_value = "scene.json")]
    output: PathBuf,

    /// Include LOD>0 submeshes
    #[arg(long)]
    lods: bool,

    /// Resolve texture references
    #[arg(long)]
    textures: bool,

    /// Explicit base skeleton container
    #[arg(long)]
    base_skeleton: Option<PathBuf>,

    /// Additional containers merged into the same scene
    #[arg(long, num_args = 1..)]
    merge: Vec<PathBuf>,
}

#[derive(Args)]
struct TexturesArgs {
    /// Path to the .pak file
    pak: PathBuf,

    /// Output directory
    #[arg(short, long)]
    output: PathBuf,

    /// Decode to PNG instead of keeping the stored DDS bytes
    #[arg(long)]
    png: bool,
}

#[derive(Args)]
struct InjectArgs {
    /// Container to rewrite
    #[arg(long)]
    meshfile: PathBuf,

    /// Replacement scene (JSON)
    #[arg(long)]
    model: Option<PathBuf>,

    /// Output container
    #[arg(short, long)]
    output: PathBuf,

    /// Only embed textures
    #[arg(short = 't', long)]
    textures_only: bool,

    /// Also write bone positions and parents
    #[arg(long)]
    bones: bool,

    /// Inject into every LOD instead of collapsing them onto LOD 0
    #[arg(long)]
    lods: bool,

    /// Folder with replacement .dds/.tga textures
    #[arg(long)]
    texfolder: Option<PathBuf>,

    /// Explicit base skeleton container
    #[arg(long)]
    base_skeleton: Option<PathBuf>,

    /// Batch mode; accepted for script compatibility
    #[arg(long)]
    nodialog: bool,
}

#[derive(Args)]
struct DumpHashesArgs {
    /// Game root to scan
    dir: PathBuf,

    /// Index file; existing entries are kept
    #[arg(short, long, default_value = "NDTextureHashes.json")]
    output: PathBuf,
}

fn parse_game(s: &str) -> Result<Game, String> {
    s.parse::<Game>().map_err(|e| e.to_string())
}

fn setup_logging(verbosity: u8) {
    let level = match verbosity {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    fmt()
        .with_env_filter(filter)
        .with_target(verbosity >= 2)
        .with_thread_ids(verbosity >= 3)
        .with_file(verbosity >= 3)
        .with_line_number(verbosity >= 3)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::from(exit_status(&err))
        }
    }
}

/// 2 for missing inputs, 3 for malformed containers, 1 otherwise
fn exit_status(err: &anyhow::Error) -> u8 {
    match err.chain().find_map(|e| e.downcast_ref::<ndpak_core::Error>()) {
        Some(e) if e.is_not_found() => 2,
        Some(e) if e.is_parse_error() => 3,
        _ => 1,
    }
}

fn run(cli: Cli) -> Result<()> {
    let globals = Globals {
        game: cli.game,
        base_dir: cli.base_dir,
        hash_index: cli.hash_index,
    };

    match cli.command {
        Commands::Info(args) => cmd_info(args, &globals),
        Commands::Export(args) => cmd_export(args, &globals),
        Commands::Textures(args) => cmd_textures(args, &globals),
        Commands::Inject(args) => cmd_inject(args, &globals),
        Commands::DumpHashes(args) => cmd_dump_hashes(args, &globals),
    }
}

/// Flags shared by every subcommand
struct Globals {
    game: Option<Game>,
    base_dir: Option<PathBuf>,
    hash_index: Option<PathBuf>,
}

impl Globals {
    fn options_for(&self, path: &Path) -> PakOptions {
        let mut options = PakOptions::for_path(path);
        if let Some(game) = self.game {
            options.game = game;
        }
        options.base_directory = self.base_dir.clone();
        options.texture_hash_index = self.hash_index.clone();
        options
    }
}

fn open_pak(path: &Path, options: &PakOptions) -> ndpak_core::Result<PakContainer> {
    if !path.is_file() {
        return Err(ndpak_core::Error::FileNotFound(path.to_path_buf()));
    }
    let opened = PakContainer::open(path, options).map_err(ndpak_core::Error::from);
    ndpak_core::ResultExt::with_context(opened, || format!("Failed to parse {}", path.display()))
}

fn cmd_info(args: InfoArgs, globals: &Globals) -> Result<()> {
    let options = globals.options_for(&args.pak);
    let pak = open_pak(&args.pak, &options)?;

    if args.json {
        let summary = JsonExporter::new().container_summary(&pak);
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    let header = &pak.header;
    println!("PAK container: {}", args.pak.display());
    println!("  Game:           {}", options.game);
    println!("  Revision:       {:?}", pak.revision);
    println!("  Magic:          {:#X}", header.magic);
    println!("  Size:           {}", format_size(pak.data().len() as u64));
    println!("  Pages:          {}", pak.pages().len());
    println!("  Fixups:         {}", pak.fixups.len());
    println!("  Raw data size:  {}", format_size(u64::from(header.raw_data_size)));

    println!("\nPages:");
    for (i, page) in pak.pages().iter().enumerate() {
        println!("  {:>3}  base {:#010X}  size {:>10}", i, page.base, page.size);
    }

    println!("\nResource items:");
    for item in &pak.resources.items {
        println!(
            "  {:#010X}  {:<28} {}",
            item.address(),
            item.item_type.as_str(),
            item.name.as_deref().unwrap_or("")
        );
    }

    println!("\nSubmeshes:");
    for submesh in pak.submeshes() {
        println!(
            "  LOD{} {:<40} {:>6} verts {:>7} indices{}",
            submesh.lod,
            submesh.name,
            submesh.vertex_count,
            submesh.index_count,
            if submesh.skin.is_some() { "  skinned" } else { "" }
        );
    }

    match &pak.skeleton {
        Some(skeleton) => println!("\nBones: {}", skeleton.bones.len()),
        None if pak.needs_base_skeleton() => println!("\nBones: none (skinned; needs a base skeleton)"),
        None => println!("\nBones: none"),
    }

    println!("\nMaterials:");
    for material in &pak.materials.materials {
        println!("  {:<40} {}", material.name, material.shader_type);
    }

    println!("\nTextures:");
    for vram in pak.vrams().iter() {
        println!("  {:#018X}  {}", vram.hash, vram.file_name);
    }

    Ok(())
}

fn cmd_export(args: ExportArgs, globals: &Globals) -> Result<()> {
    let mut options = globals.options_for(&args.pak);
    options.include_lods = args.lods;
    options.load_textures = args.textures;
    if args.base_skeleton.is_some() {
        options.base_skeleton = args.base_skeleton.clone();
    }

    let mut builder = SceneBuilder::new(&options);
    for path in std::iter::once(&args.pak).chain(&args.merge) {
        if !path.is_file() {
            return Err(ndpak_core::Error::FileNotFound(path.clone()).into());
        }
        info!("Decoding {}", path.display());
        let added = builder.add_file(path).map_err(ndpak_core::Error::from);
        ndpak_core::ResultExt::with_context(added, || format!("Failed to decode {}", path.display()))?;
    }
    let scene = builder.finish();

    JsonExporter::new()
        .export_scene(&scene, &args.output)
        .with_context(|| format!("Failed to write {}", args.output.display()))?;

    println!(
        "Exported {} meshes, {} bones, {} materials to {}",
        scene.meshes.len(),
        scene.bones.len(),
        scene.materials.len(),
        args.output.display()
    );
    Ok(())
}

fn cmd_textures(args: TexturesArgs, globals: &Globals) -> Result<()> {
    let options = globals.options_for(&args.pak);
    let pak = open_pak(&args.pak, &options)?;
    let dictionary = TextureDictionary::from_options(&options, Some(&args.pak))
        .context("Failed to load texture hash index")?;
    let codec = BlockCodec::new();
    let loader = pak.texture_loader(dictionary.as_ref(), &codec);

    let format = if args.png { ImageFormat::Png } else { ImageFormat::Dds };
    let writer = TextureWriter::new(&args.output, format);
    fs::create_dir_all(&args.output).context("Failed to create output directory")?;

    let mut written = 0;
    let mut failed = 0;

    for vram in pak.vrams().iter() {
        let result = match format {
            ImageFormat::Dds => loader
                .load_raw(vram.hash)
                .map_err(anyhow::Error::from)
                .and_then(|raw| Ok(writer.write_raw(&raw)?)),
            ImageFormat::Png => loader
                .load(&TextureRequest::Vram { hash: vram.hash })
                .map_err(anyhow::Error::from)
                .and_then(|texture| Ok(writer.write_decoded(&texture)?)),
        };
        match result {
            Ok(path) => {
                debug!("Wrote {}", path.display());
                written += 1;
            }
            Err(e) => {
                warn!("Skipping {}: {:#}", vram.file_name, e);
                failed += 1;
            }
        }
    }

    // Placeholders and derived maps only exist as decoded images
    for request in &pak.materials.texture_requests {
        if matches!(request, TextureRequest::Vram { .. }) {
            continue;
        }
        let result = loader
            .load(request)
            .map_err(anyhow::Error::from)
            .and_then(|texture| Ok(writer.write_decoded(&texture)?));
        match result {
            Ok(path) => {
                debug!("Wrote {}", path.display());
                written += 1;
            }
            Err(e) => {
                warn!("Skipping {:?}: {:#}", request, e);
                failed += 1;
            }
        }
    }

    println!("Textures written: {}", written);
    if failed > 0 {
        println!("Textures skipped: {}", failed);
    }
    Ok(())
}

fn cmd_inject(args: InjectArgs, globals: &Globals) -> Result<()> {
    let mut options = globals.options_for(&args.meshfile);
    options.include_lods = args.lods;
    if args.base_skeleton.is_some() {
        options.base_skeleton = args.base_skeleton.clone();
    }
    if args.nodialog {
        debug!("Batch mode");
    }
    if args.model.is_none() && !args.textures_only {
        bail!("--model is required unless injecting textures only (-t)");
    }

    let inject_options = InjectOptions {
        textures_only: args.textures_only,
        bones: args.bones,
        texture_folder: args.texfolder.clone(),
    };
    let codec = BlockCodec::new();
    let injected = inject::run(
        &args.meshfile,
        args.model.as_deref(),
        &args.output,
        &options,
        inject_options,
        Some(&codec),
    )
    .map_err(ndpak_core::Error::from);
    let report =
        ndpak_core::ResultExt::with_context(injected, || format!("Injection into {} failed", args.meshfile.display()))?;

    println!("Injection complete: {}", args.output.display());
    println!("  Submeshes injected:   {}", report.injected);
    println!("  Placeholders:         {}", report.placeholders);
    println!("  Relocated:            {}", report.relocated.len());
    println!("  New pages:            {}", report.new_pages);
    println!("  Textures embedded:    {}", report.textures);
    println!("  Bones written:        {}", report.bones_written);
    if let Some(base) = &report.base_written {
        println!("  Base skeleton:        {}", base.display());
    }
    if report.modded {
        println!("  (source was already modified by an earlier injection)");
    }
    Ok(())
}

fn cmd_dump_hashes(args: DumpHashesArgs, globals: &Globals) -> Result<()> {
    if !args.dir.is_dir() {
        bail!("Directory not found: {}", args.dir.display());
    }
    let options = globals.options_for(&args.dir);

    let mut index = if args.output.is_file() {
        TextureHashIndex::load(&args.output)
            .with_context(|| format!("Failed to read {}", args.output.display()))?
    } else {
        TextureHashIndex::default()
    };

    let summary = dump_texture_hashes(&args.dir, &options, &mut index).context("Failed to scan dictionaries")?;
    index
        .save(&args.output)
        .with_context(|| format!("Failed to write {}", args.output.display()))?;

    println!("Indexed {} textures from {} files", summary.textures, summary.files);
    println!("{} textures known for {}", index.texture_count(options.game), options.game);
    for (world, file, start) in &summary.raw_data_starts {
        debug!("{world}/{file}: rawDataStart {start:#X}");
    }
    Ok(())
}

fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
