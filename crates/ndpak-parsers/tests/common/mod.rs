// ndpak-parsers/tests/common/mod.rs
//! Synthetic legacy containers for integration tests.
//!
//! Everything lives in one page. Offsets handed out by [`PageImage`] are
//! relative to the page start, which is what a stored pointer holds.

#![allow(dead_code)]

use ndpak_parsers::ByteWriter;

pub const MAGIC: u32 = 0xA79;
pub const PAGE_TABLE: u64 = 0x30;
pub const FIXUP_HEADER: u64 = 96;
pub const RAW_TAIL: [u8; 16] = [0x5A; 16];

/// Content of one page with its pointer sites
pub struct PageImage {
    w: ByteWriter,
    pointers: Vec<u64>,
}

impl PageImage {
    fn new() -> Self {
        let mut w = ByteWriter::new();
        w.write_zeros(20);
        Self { w, pointers: Vec::new() }
    }

    pub fn len(&self) -> u64 {
        self.w.len() as u64
    }

    /// Reserve `len` zeroed bytes at the next multiple of `align`
    pub fn alloc(&mut self, len: usize, align: usize) -> u64 {
        self.w.pad_until(align, 0);
        let at = self.len();
        self.w.write_zeros(len);
        at
    }

    pub fn string(&mut self, s: &str) -> u64 {
        let at = self.len();
        self.w.seek_end();
        self.w.write_bytes(s.as_bytes());
        self.w.write_u8(0);
        at
    }

    pub fn u8(&mut self, at: u64, v: u8) {
        self.w.seek(at);
        self.w.write_u8(v);
    }

    pub fn u16(&mut self, at: u64, v: u16) {
        self.w.seek(at);
        self.w.write_u16(v);
    }

    pub fn u32(&mut self, at: u64, v: u32) {
        self.w.seek(at);
        self.w.write_u32(v);
    }

    pub fn i32(&mut self, at: u64, v: i32) {
        self.w.seek(at);
        self.w.write_i32(v);
    }

    pub fn u64(&mut self, at: u64, v: u64) {
        self.w.seek(at);
        self.w.write_u64(v);
    }

    pub fn f32s(&mut self, at: u64, values: &[f32]) {
        self.w.seek(at);
        for v in values {
            self.w.write_f32(*v);
        }
    }

    /// Pointer at `at` to `target`, with a fixup record
    pub fn ptr(&mut self, at: u64, target: u64) {
        self.u64(at, target);
        self.pointers.push(at);
    }
}

/// One submesh of the synthetic geometry
#[derive(Debug, Clone)]
pub struct MeshSpec {
    pub name: String,
    pub vertices: u32,
    pub indices: u32,
    pub skinned: bool,
    /// Which of the four normal-recalc buffer pointers are set
    pub normal_recalc: Option<[bool; 4]>,
}

impl MeshSpec {
    pub fn new(name: &str, vertices: u32) -> Self {
        Self {
            name: name.into(),
            vertices,
            indices: 3,
            skinned: false,
            normal_recalc: None,
        }
    }

    pub fn skinned(mut self) -> Self {
        self.skinned = true;
        self
    }

    pub fn normal_recalc(mut self, slots: [bool; 4]) -> Self {
        self.normal_recalc = Some(slots);
        self
    }

    /// Position of vertex `i` in file units
    pub fn position(i: u32) -> [f32; 3] {
        [i as f32 * 0.01, 0.02, -(i as f32) * 0.005]
    }
}

/// `(name, parent, position)` per bone
pub type BoneSpec = (&'static str, i32, [f32; 3]);

/// Builder for a legacy single-page container
#[derive(Debug, Clone, Default)]
pub struct ContainerBuilder {
    pub meshes: Vec<MeshSpec>,
    pub bones: Vec<BoneSpec>,
    pub lods: u32,
}

/// Addresses of interest in a built container, page-relative
#[derive(Debug, Clone, Default)]
pub struct Layout {
    pub page_base: u64,
    pub pointer_sites: Vec<u64>,
    pub login: u64,
    pub lod_descs: Vec<u64>,
    pub transforms: u64,
    /// `(mesh name, descriptor)` per normal-recalc descriptor
    pub normal_recalc: Vec<(String, u64)>,
}

impl ContainerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mesh(mut self, mesh: MeshSpec) -> Self {
        self.meshes.push(mesh);
        self
    }

    pub fn bones(mut self, bones: &[BoneSpec]) -> Self {
        self.bones = bones.to_vec();
        self
    }

    pub fn lods(mut self, lods: u32) -> Self {
        self.lods = lods;
        self
    }

    pub fn build(&self) -> Vec<u8> {
        self.build_with_layout().0
    }

    pub fn build_with_layout(&self) -> (Vec<u8>, Layout) {
        let mut page = PageImage::new();
        let mut layout = Layout::default();

        let with_joints = !self.bones.is_empty();
        let with_geometry = !self.meshes.is_empty();
        let entry_count = u16::from(with_joints) + u16::from(with_geometry);
        let entries = page.alloc(16 * usize::from(entry_count), 1);

        let login = page.alloc(48, 16);
        layout.login = login;
        let mut items = Vec::new();
        if with_joints {
            items.push(("skeleton", "JOINT_HIERARCHY", self.write_joints(&mut page, &mut layout)));
        }
        if with_geometry {
            items.push(("hero", "GEOMETRY_1", self.write_geometry(&mut page, &mut layout)));
        }
        for (e, (name, kind, item)) in items.into_iter().enumerate() {
            let name_at = page.string(name);
            let type_at = page.string(kind);
            page.u64(item, name_at);
            page.u64(item + 8, type_at);
            let entry = entries + 16 * e as u64;
            page.u64(entry, name_at);
            page.u32(entry + 8, item as u32);
        }

        page.w.pad_until(16, 0);
        let page_len = page.len();
        page.u64(0, 0xDEAD_BEEF_DEAD_BEEF);
        page.u32(12, page_len as u32);
        page.u16(18, entry_count);

        let fixup_table = PAGE_TABLE + 12;
        let records = fixup_table + FIXUP_HEADER;
        let records_end = records + 8 * page.pointers.len() as u64;
        let page_base = records_end.next_multiple_of(16);

        let mut out = ByteWriter::new();
        out.write_u32(MAGIC);
        out.write_u32(page_base as u32);
        out.write_u32(0);
        out.write_u32(login as u32);
        out.write_u32(1);
        out.write_u32(PAGE_TABLE as u32);
        out.write_u32(1);
        out.write_u32(fixup_table as u32);
        out.write_u32(RAW_TAIL.len() as u32);
        out.write_zeros(PAGE_TABLE as usize - out.len());

        out.write_u32(page_base as u32);
        out.write_u32(page_len as u32);
        out.write_u32(0);

        out.write_u32(1);
        out.write_u32(records as u32);
        out.write_u32(page.pointers.len() as u32);
        out.write_zeros((FIXUP_HEADER - 12) as usize);
        for &at in &page.pointers {
            out.write_u16(0);
            out.write_u16(0);
            out.write_u32(at as u32);
        }
        out.pad_until(16, 0);

        out.write_bytes(page.w.as_slice());
        out.write_bytes(&RAW_TAIL);

        layout.page_base = page_base;
        layout.pointer_sites = page.pointers.clone();
        (out.into_inner(), layout)
    }

    fn write_joints(&self, page: &mut PageImage, layout: &mut Layout) -> u64 {
        let n = self.bones.len();
        let item = page.alloc(96, 16);
        let body = item + 52;
        page.u32(body, n as u32);

        let hierarchy = 64 + 48 * n as u64;
        let block = page.alloc((hierarchy + 24) as usize + 16 * n, 16);
        page.u16(block + 16, n as u16);
        page.u16(block + 18, n as u16);
        page.u32(block + 32, 64);
        page.u32(block + 60, hierarchy as u32);
        for (i, (_, _, position)) in self.bones.iter().enumerate() {
            let t = block + 64 + 48 * i as u64;
            page.f32s(t, &[1.0, 1.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0]);
            page.f32s(t + 32, position);
        }
        page.u32(block + hierarchy + 20, 24);
        let links = block + hierarchy + 24;
        for (i, (_, parent, _)) in self.bones.iter().enumerate() {
            let link = links + 16 * i as u64;
            page.i32(link, 0);
            page.i32(link + 4, *parent);
            page.i32(link + 8, i as i32);
            page.i32(link + 12, 0);
        }

        let names = page.alloc(16 * n, 16);
        for (i, (name, _, _)) in self.bones.iter().enumerate() {
            let at = page.string(name);
            page.u64(names + 16 * i as u64 + 8, at);
        }
        page.ptr(body + 12, block);
        page.ptr(body + 36, names);
        layout.transforms = block + 64;
        item
    }

    fn write_geometry(&self, page: &mut PageImage, layout: &mut Layout) -> u64 {
        let item = page.alloc(136, 16);
        let body = item + 32;
        let count = self.meshes.len();
        page.u32(body + 8, count as u32);
        page.u32(body + 12, self.lods);

        let submeshes = page.alloc(176 * count, 16);
        page.ptr(body + 40, submeshes);
        for (i, mesh) in self.meshes.iter().enumerate() {
            self.write_submesh(page, layout, submeshes + 176 * i as u64, mesh);
        }

        if self.lods > 0 {
            let table = page.alloc(8 * self.lods as usize, 16);
            page.ptr(body + 48, table);
            let last = submeshes + 176 * (count as u64 - 1);
            for a in 0..u64::from(self.lods) {
                let desc = page.alloc(32, 16);
                page.ptr(table + 8 * a, desc);
                if a == 0 {
                    page.u32(desc + 4, count as u32);
                    page.ptr(desc + 24, submeshes);
                } else {
                    page.u32(desc + 4, 1);
                    page.ptr(desc + 24, last);
                }
                layout.lod_descs.push(desc);
            }
        }
        item
    }

    fn write_submesh(&self, page: &mut PageImage, layout: &mut Layout, at: u64, mesh: &MeshSpec) {
        let n = mesh.vertices;
        let name = page.string(&format!("root|hero|{}", mesh.name));
        page.ptr(at + 8, name);
        page.u32(at + 36, n);
        page.u32(at + 40, mesh.indices);
        page.u32(at + 44, 3);

        let streams = page.alloc(3 * 24, 16);
        page.ptr(at + 56, streams);
        for (j, (comp_type, stride)) in [(0u8, 12u16), (34, 4), (31, 4)].into_iter().enumerate() {
            let desc = streams + 24 * j as u64;
            let size = u32::from(stride) * n;
            page.u8(desc, 1);
            page.u16(desc + 2, stride);
            page.u32(desc + 4, size);
            let info = page.alloc(8, 8);
            page.u8(info + 3, comp_type);
            page.ptr(desc + 8, info);
            let buffer = page.alloc(size as usize, 16);
            if j == 0 {
                for v in 0..n {
                    page.f32s(buffer + 12 * u64::from(v), &MeshSpec::position(v));
                }
            } else if j == 2 {
                for v in 0..n {
                    page.u32(buffer + 4 * u64::from(v), 0x007F_0000);
                }
            }
            page.ptr(desc + 16, buffer);
        }

        let faces = page.alloc(2 * mesh.indices as usize, 16);
        for k in 0..mesh.indices {
            page.u16(faces + 2 * u64::from(k), (k % n) as u16);
        }
        page.ptr(at + 72, faces);

        if mesh.skinned {
            let desc = page.alloc(32, 16);
            page.u32(desc + 4, n);
            let map = page.alloc(8 * n as usize, 16);
            let weights = page.alloc(4 * n as usize, 16);
            for v in 0..n {
                page.u32(map + 8 * u64::from(v), 1);
                page.u32(map + 8 * u64::from(v) + 4, 4 * v);
                let bone = v % 2;
                page.u32(weights + 4 * u64::from(v), (bone << 22) | 0x3F_FFFF);
            }
            page.ptr(desc + 16, map);
            page.ptr(desc + 24, weights);
            page.ptr(at + 104, desc);
        }

        if let Some(slots) = mesh.normal_recalc {
            let desc = page.alloc(40, 16);
            page.u32(desc, n);
            page.u32(desc + 4, mesh.indices);
            for (k, set) in slots.into_iter().enumerate() {
                if set {
                    let buffer = page.alloc(2 * n as usize, 16);
                    for v in 0..n {
                        page.u16(buffer + 2 * u64::from(v), 0x1111);
                    }
                    page.ptr(desc + 8 + 8 * k as u64, buffer);
                }
            }
            page.ptr(at + 136, desc);
            layout.normal_recalc.push((mesh.name.clone(), desc));
        }
    }
}

/// Three-bone chain rooted at bone 0
pub const CHAIN: [BoneSpec; 3] = [
    ("root", -1, [0.0, 0.0, 0.0]),
    ("spine", 0, [0.0, 0.5, 0.0]),
    ("head", 1, [0.0, 0.25, 0.0]),
];

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}
