use std::path::Path;

use anyhow::{bail, Context, Result};

use mmd_tools::{ConvertedMesh, MeshConverter, PmdModel, VmdMotion};

fn main() {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage:");
        eprintln!("  mmd_inspect <model.pmd> [--convert] [--max-bones N] [--cache <out.bin>]");
        eprintln!("  mmd_inspect <motion.vmd>");
        eprintln!();
        eprintln!("Examples:");
        eprintln!("  mmd_inspect miku.pmd");
        eprintln!("  mmd_inspect miku.pmd --convert --max-bones 16");
        eprintln!("  mmd_inspect miku.pmd --convert --cache miku.mesh");
        eprintln!("  mmd_inspect dance.vmd");
        std::process::exit(1);
    }

    if let Err(e) = run(&args[1..]) {
        eprintln!("mmd_inspect failed: {:#}", e);
        std::process::exit(1);
    }
}

fn run(args: &[String]) -> Result<()> {
    let path = Path::new(&args[0]);
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "pmd" => inspect_model(path, &args[1..]),
        "vmd" => inspect_motion(path),
        other => bail!("unsupported file extension '{}'", other),
    }
}

fn inspect_model(path: &Path, options: &[String]) -> Result<()> {
    let model = PmdModel::load(path)
        .with_context(|| format!("loading model {}", path.display()))?;
    println!("{}", serde_json::to_string_pretty(&model.summary())?);

    let mut convert = false;
    let mut max_bones = None;
    let mut cache_path = None;
    let mut i = 0;
    while i < options.len() {
        match options[i].as_str() {
            "--convert" => {
                convert = true;
                i += 1;
            }
            "--max-bones" => {
                let value = options
                    .get(i + 1)
                    .context("--max-bones requires a value")?;
                max_bones = Some(value.parse::<usize>().context("--max-bones value")?);
                i += 2;
            }
            "--cache" => {
                cache_path = Some(options.get(i + 1).context("--cache requires a path")?);
                i += 2;
            }
            other => bail!("unknown option '{}'", other),
        }
    }
    if !convert && cache_path.is_none() && max_bones.is_none() {
        return Ok(());
    }

    let mut converter = MeshConverter::new(&model);
    if let Some(n) = max_bones {
        converter = converter.with_max_bone_count(n);
    }
    let converted = converter.convert().context("converting mesh")?;
    print_converted(&converted);

    if let Some(out) = cache_path {
        let mut file = std::fs::File::create(out)
            .with_context(|| format!("creating {}", out))?;
        converted.write_cache(&mut file)?;
        eprintln!("wrote cache to {}", out);
    }
    Ok(())
}

fn print_converted(converted: &ConvertedMesh) {
    for (i, batch) in converted.batches.iter().enumerate() {
        println!(
            "batch {}: material {}, {} vertices, {} triangles, {} bones, stride {}",
            i,
            batch.material_no,
            batch.vertex_count(),
            batch.triangle_count(),
            batch.bone_table.len(),
            batch.stride,
        );
    }
    println!(
        "skin bucket: {} vertices, {} bones, {} material index blocks",
        converted.skin.vertex_count(),
        converted.skin.bone_table.len(),
        converted.skin.index_blocks.len(),
    );
}

fn inspect_motion(path: &Path) -> Result<()> {
    let motion = VmdMotion::load(path)
        .with_context(|| format!("loading motion {}", path.display()))?;
    println!("{}", serde_json::to_string_pretty(&motion.summary())?);
    Ok(())
}
