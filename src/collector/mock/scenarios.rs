//! Pre-built mock filesystem scenarios for testing.
//!
//! Each scenario describes the kernel interfaces of one kind of box.

use super::filesystem::MockFs;

const MEMINFO: &str = "\
MemTotal:        1984512 kB
MemFree:          100000 kB
MemAvailable:     812340 kB
Buffers:           20480 kB
Cached:           612000 kB
SwapCached:         1024 kB
Active:           540000 kB
Inactive:         410000 kB
SwapTotal:        262140 kB
SwapFree:         250000 kB
Dirty:                64 kB
Shmem:             30240 kB
Slab:              81920 kB
SReclaimable:      40960 kB
SUnreclaim:        40960 kB
KernelStack:        6144 kB
PageTables:        12288 kB
VmallocUsed:       20480 kB
CmaTotal:         327680 kB
CmaFree:          120000 kB
";

const BUDDYINFO: &str = "\
Node 0, zone      DMA     18     10      7      5      3      2      1      1      0      0      0
Node 0, zone   Normal    310    142     61     22      9      4      2      1      1      0      0
";

impl MockFs {
    /// Common part of every set-top box: meminfo, buddyinfo, a compositor
    /// with two render threads and a browser process.
    fn base_box() -> Self {
        let mut fs = Self::new();

        fs.add_file("/proc/meminfo", MEMINFO);
        fs.add_file("/proc/buddyinfo", BUDDYINFO);

        fs.add_process(1, "systemd", "/sbin/init");
        fs.add_process(612, "westeros", "/usr/bin/westeros --renderer libwesteros_render_gl.so");
        fs.add_thread(618, 612, "wst-render");
        fs.add_thread(619, 612, "wst-vsync");
        fs.add_process(1450, "WPEWebProcess", "/usr/bin/WPEWebProcess 7 18");

        fs.add_file("/sys/block/zram0/mm_stat", "20971520 5242880 5767168 0 6291456 120 9 2\n");
        fs.add_file("/sys/block/zram0/max_comp_streams", "2\n");
        fs.add_file("/sys/class/zram-control/hot_add", "1\n");

        fs.add_file("/sys/fs/cgroup/lxc/dac/memory.current", "73400320\n");
        fs.add_file("/sys/fs/cgroup/lxc/dac/memory.max", "134217728\n");
        fs.add_file("/sys/fs/cgroup/lxc/dac/memory.stat", "anon 52428800\nfile 20971520\n");

        fs
    }

    /// Broadcom box: CMA areas, bmem pools and the V3D client table.
    pub fn broadcom_box() -> Self {
        let mut fs = Self::base_box();

        fs.add_file("/sys/kernel/debug/cma/cma-0/count", "65536\n");
        fs.add_file("/sys/kernel/debug/cma/cma-0/used", "30000\n");
        fs.add_file("/sys/kernel/debug/cma/cma-1/count", "16384\n");
        fs.add_file("/sys/kernel/debug/cma/cma-1/used", "2048\n");

        fs.add_file(
            "/proc/brcm/bmem",
            "\
name        base        size      used      free
bmem.0      0x20000000  393216    201728    191488
bmem.1      0x70000000  131072    4096      126976
",
        );

        fs.add_file(
            "/sys/kernel/debug/v3d/client_mem",
            "\
tid      name              bytes
618      wst-render        16777216
619      wst-vsync         1048576
1450     WPEWebProcess     33554432
31337    exited            4096
",
        );

        fs
    }

    /// Amlogic box: Mali `gpu_memory` and the DDR bandwidth monitor.
    pub fn amlogic_box() -> Self {
        let mut fs = Self::base_box();

        fs.add_file("/sys/kernel/debug/cma/cma_reserved/count", "49152\n");
        fs.add_file("/sys/kernel/debug/cma/cma_reserved/used", "12288\n");

        fs.add_file(
            "/sys/kernel/debug/mali0/gpu_memory",
            "\
mali0                  12800
  kctx-0xffffffc05e8e0000       8192        612        618
  kctx-0xffffffc05e8f0000       4608       1450       1450
",
        );

        fs.add_file(
            "/sys/class/aml_ddr/bandwidth",
            "Total bandwidth:  1843200 KB/s, usage: 23.41%\n",
        );

        fs
    }

    /// Realtek box: per-context Mali memory profiles.
    pub fn realtek_box() -> Self {
        let mut fs = Self::base_box();

        fs.add_file(
            "/sys/kernel/debug/mali/ctx/618_0/mem_profile",
            "Total allocated memory: 8388608\n",
        );
        fs.add_file(
            "/sys/kernel/debug/mali/ctx/1450_1/mem_profile",
            "Total allocated memory: 2097152\n",
        );

        fs
    }
}
