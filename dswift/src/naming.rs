use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

/// Incremented once per generator built in this process.
static BUILD_EPOCH: AtomicU64 = AtomicU64::new(0);

/// A type name for the generator of `template`, unique within the process.
pub fn generator_class_name(template: &Path) -> String {
    let epoch = BUILD_EPOCH.fetch_add(1, Ordering::Relaxed);
    class_name_for(template, epoch)
}

fn class_name_for(template: &Path, epoch: u64) -> String {
    let mut hasher = DefaultHasher::new();
    template.hash(&mut hasher);
    epoch.hash(&mut hasher);
    format!("DSwiftGenerator_{:016x}", hasher.finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_depend_on_path_and_epoch() {
        let a = Path::new("/t/a.dswift");
        let b = Path::new("/t/b.dswift");
        assert_eq!(class_name_for(a, 3), class_name_for(a, 3));
        assert_ne!(class_name_for(a, 3), class_name_for(a, 4));
        assert_ne!(class_name_for(a, 3), class_name_for(b, 3));
        assert_ne!(generator_class_name(a), generator_class_name(a));
    }
}
