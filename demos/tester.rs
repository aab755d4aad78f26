use treealloc::{Counting, Handle, System, Tree, strdup, tree_format};

/// What the demo stores in its root allocation.
#[repr(C)]
#[allow(dead_code)]
struct Sample {
  x: i32,
  y: i32,
  z: i32,
  a: i64,
  b: i64,
  c: i64,
  text: Option<Handle>,
}

/// Prints how many records the tree holds and how many payloads are live in
/// the backing allocator.
fn print_stats(
  label: &str,
  tree: &Tree<Counting>,
) {
  let stats = tree.stats();
  let heap = tree.backend().stats();

  println!(
    "[{}] records = {}, roots = {}, payload bytes = {}, live heap blocks = {}",
    label,
    stats.records,
    stats.roots,
    stats.payload_bytes,
    heap.live(),
  );
}

fn main() {
  let mut tree = Tree::with_backend(Counting::new(System));

  print_stats("start", &tree);

  // --------------------------------------------------------------------
  // 1) A root holding a plain struct, zero initialised.
  // --------------------------------------------------------------------
  let sample = tree.create_for::<Sample>(None).unwrap();
  let sample_ptr = tree.as_ptr(sample) as *mut Sample;

  println!("\n[1] Root {} with {} bytes", sample, tree.size(sample));

  // --------------------------------------------------------------------
  // 2) A formatted string in a scratch root, then stolen by the struct.
  // --------------------------------------------------------------------
  let scratch = tree.create(None, 128).unwrap();
  let text = tree_format!(tree, scratch, "{}{}{}", 3, 2, 1).unwrap();

  tree.reparent(sample, text);
  tree.destroy(scratch);

  println!("\n[2] Stole {} from the scratch root", text);
  print_stats("after steal", &tree);

  // --------------------------------------------------------------------
  // 3) Write through the payload like any other heap memory.
  // --------------------------------------------------------------------
  unsafe {
    (*sample_ptr).x = 111;
    (*sample_ptr).text = Some(text);
  }

  let label = strdup(&mut tree, sample, "sample").unwrap();

  unsafe {
    println!(
      "\n[3] {} => {} ({})",
      (*sample_ptr).x,
      (*sample_ptr).text.and_then(|t| tree.as_str(t)).unwrap_or("?"),
      tree.as_str(label).unwrap_or("?"),
    );
  }

  print_stats("before free", &tree);

  // --------------------------------------------------------------------
  // 4) Freeing the root takes both strings with it.
  // --------------------------------------------------------------------
  tree.destroy(sample);

  println!(
    "\n[4] text live? {}, label live? {}",
    tree.is_live(text),
    tree.is_live(label)
  );
  print_stats("end", &tree);
}
